pub mod glyphs;
pub mod overlay_annotator;
