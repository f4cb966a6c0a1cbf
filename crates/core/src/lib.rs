pub mod config;

pub mod shared {
    pub mod constants;
    pub mod expression;
    pub mod frame;
    pub mod model_resolver;
    pub mod region;
}

pub mod capture {
    pub mod capture_source;

    pub mod domain {
        pub mod camera_device;
        pub mod capture_state;
        pub mod video_source;
    }

    pub mod infrastructure {
        pub mod ffmpeg_camera;
    }
}

pub mod detection {
    pub mod model_loader;

    pub mod domain {
        pub mod detected_face;
        pub mod detection_provider;
    }

    pub mod infrastructure;
}

pub mod annotation {
    pub mod annotation_loop;
    pub mod detection_worker;
    pub mod loop_logger;
    pub mod poll_handle;

    pub mod domain {
        pub mod drawing_surface;
        pub mod expression_tally;
        pub mod face_annotator;
    }

    pub mod infrastructure;
}

pub mod recording {
    pub mod recording_pipeline;

    pub mod domain {
        pub mod artifact;
        pub mod artifact_sink;
        pub mod codec;
        pub mod media_recorder;
        pub mod surface_stream;
    }

    pub mod infrastructure;
}

pub mod session {
    pub mod session_status;
    pub mod tracker_session;
}

#[cfg(test)]
mod test_support;
