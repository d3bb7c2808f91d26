//! Optional capabilities injected into the media stages.

use std::sync::Arc;
use tracing::{info, warn};

use reelcut_media::{
    ContentShotDetector, LutLibrary, ShotDetector, SrtFileSource, Stabilizer, SubjectDetector,
    TranscriptSource, VidStabStabilizer, WhisperCliTranscriber,
};

use crate::config::WorkerConfig;

/// Every optional collaborator of the pipeline. `None` means the stage
/// runs its documented fallback.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub shot_detector: Option<Arc<dyn ShotDetector>>,
    pub subject_detector: Option<Arc<dyn SubjectDetector>>,
    pub transcript_source: Option<Arc<dyn TranscriptSource>>,
    pub stabilizer: Option<Arc<dyn Stabilizer>>,
    pub luts: Option<LutLibrary>,
    /// Capabilities that were requested but could not be set up.
    pub unavailable: Vec<(&'static str, String)>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("shot_detector", &self.shot_detector.as_ref().map(|d| d.name()))
            .field("subject_detector", &self.subject_detector.as_ref().map(|d| d.name()))
            .field("transcript_source", &self.transcript_source.as_ref().map(|t| t.name()))
            .field("stabilizer", &self.stabilizer.as_ref().map(|s| s.name()))
            .field("luts", &self.luts.as_ref().map(|l| l.dir().to_path_buf()))
            .field("unavailable", &self.unavailable)
            .finish()
    }
}

impl Capabilities {
    /// Wire up the capabilities `config` asks for.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let mut caps = Capabilities {
            shot_detector: Some(Arc::new(ContentShotDetector::default())),
            ..Default::default()
        };

        caps.subject_detector = caps.load_subject_detector(config);

        if let Some(path) = &config.transcript_path {
            caps.transcript_source = Some(Arc::new(SrtFileSource::new(path)));
        } else if let Some(model) = &config.whisper_model {
            match WhisperCliTranscriber::locate(&config.whisper_binary, model.clone()) {
                Ok(whisper) => caps.transcript_source = Some(Arc::new(whisper)),
                Err(e) => {
                    warn!(error = %e, "Whisper transcription unavailable");
                    caps.unavailable.push(("transcript", e.to_string()));
                }
            }
        }

        if config.stabilize {
            caps.stabilizer = Some(Arc::new(VidStabStabilizer::default()));
        }

        caps.luts = config.lut_dir.as_ref().map(LutLibrary::new);

        info!(capabilities = ?caps, "Capabilities configured");
        caps
    }

    #[cfg(feature = "opencv")]
    fn load_subject_detector(&mut self, config: &WorkerConfig) -> Option<Arc<dyn SubjectDetector>> {
        let path = config.face_model_path.as_ref()?;
        match reelcut_media::YuNetSubjectDetector::new(path) {
            Ok(detector) => Some(Arc::new(detector)),
            Err(e) => {
                warn!(error = %e, "Subject detector unavailable, using centre crop");
                self.unavailable.push(("subject_detector", e.to_string()));
                None
            }
        }
    }

    #[cfg(not(feature = "opencv"))]
    fn load_subject_detector(&mut self, config: &WorkerConfig) -> Option<Arc<dyn SubjectDetector>> {
        if config.face_model_path.is_some() {
            warn!("Built without the opencv feature, ignoring face model");
            self.unavailable
                .push(("subject_detector", "built without opencv".to_string()));
        }
        None
    }
}
