use anyhow::{anyhow, Result};
use std::sync::Arc;

use super::{FrameSource, SensorSink, SourceStats};
use crate::detect::{negotiate, DetectionCapability};
use crate::pipeline::{FrameIngestPipeline, PipelineStats};
use crate::track::ObservedSnapshot;

/// One scanning session: a source feeding one pipeline.
///
/// Teardown order is source first, so no callback can arrive at a pipeline that is
/// shutting down.
pub struct ScanSession {
    source: Box<dyn FrameSource>,
    pipeline: Arc<FrameIngestPipeline>,
    enabled: Vec<DetectionCapability>,
    running: bool,
}

impl ScanSession {
    /// Negotiate detection kinds with the source and start delivering.
    pub fn start(
        mut source: Box<dyn FrameSource>,
        pipeline: FrameIngestPipeline,
        requested: &[DetectionCapability],
    ) -> Result<Self> {
        let available = source.available_capabilities();
        let enabled = negotiate(requested, &available);
        if enabled.is_empty() {
            return Err(anyhow!(
                "source {} offers none of the requested detection kinds {:?}",
                source.name(),
                requested
            ));
        }
        log::info!("session on {}: enabling {:?}", source.name(), enabled);

        let pipeline = Arc::new(pipeline);
        let sink: Arc<dyn SensorSink> = pipeline.clone();
        source.start(&enabled, sink)?;

        Ok(Self {
            source,
            pipeline,
            enabled,
            running: true,
        })
    }

    pub fn pipeline(&self) -> &FrameIngestPipeline {
        &self.pipeline
    }

    pub fn enabled(&self) -> &[DetectionCapability] {
        &self.enabled
    }

    pub fn source_stats(&self) -> SourceStats {
        self.source.stats()
    }

    pub fn snapshot(&self) -> Arc<ObservedSnapshot> {
        self.pipeline.snapshot()
    }

    /// Stop the source, then let the pipeline drain and shut down.
    pub fn stop(mut self) -> Result<PipelineStats> {
        self.running = false;
        self.source.stop()?;
        log::info!("session on {} stopped: {:?}", self.source.name(), self.source.stats());
        Ok(self.pipeline.stats())
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.running {
            if let Err(e) = self.source.stop() {
                log::warn!("session teardown: {:#}", e);
            }
        }
    }
}
