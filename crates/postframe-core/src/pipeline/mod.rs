//! Multi-image publish pipeline.
//!
//! Sequences a batch of selected images through cropping, review, filter
//! application, upload and record creation.
//!
//! ```text
//! Selecting -> Cropping -> Reviewing -> Confirming -> Uploading -> Done
//!                  ^            |                          |
//!                  +------------+                          +--> Failed
//! ```
//!
//! Every selected image is either waiting in the crop queue or sits in the
//! completed list, never both:
//! `queue.len() + completed.len() == sources.len()`. Completed order is
//! display order. Sources are kept until the batch is submitted or
//! cancelled so a change of aspect can send images back through the crop
//! surface.

mod upload;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{CropPreset, PipelineConfig};
use crate::error::{PublishError, ValidationError};
use crate::filter::FilterSpec;
use crate::geometry::{aspects_match, STORY_ASPECT};
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::source::{SelectedFile, SourceId, SourceImage};
use crate::surface::{CropOutput, CropSurface, SurfaceError, SurfaceOptions};

pub use upload::{PendingUpload, PublishContext, PublishReceipt, UploadPlan};

use upload::UploadProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    Selecting,
    Cropping,
    Reviewing,
    Confirming,
    Uploading,
    Done,
    Failed,
}

impl PublishState {
    pub fn name(self) -> &'static str {
        match self {
            PublishState::Selecting => "selecting",
            PublishState::Cropping => "cropping",
            PublishState::Reviewing => "reviewing",
            PublishState::Confirming => "confirming",
            PublishState::Uploading => "uploading",
            PublishState::Done => "done",
            PublishState::Failed => "failed",
        }
    }

    /// States in which the batch itself may still be edited.
    fn is_editable(self) -> bool {
        matches!(
            self,
            PublishState::Selecting
                | PublishState::Cropping
                | PublishState::Reviewing
                | PublishState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishTarget {
    #[default]
    Feed,
    Story,
}

/// A confirmed crop waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedImage {
    pub output: CropOutput,
    pub preview: PreviewHandle,
}

impl CroppedImage {
    pub fn source_id(&self) -> SourceId {
        self.output.source_id
    }

    pub fn aspect(&self) -> f64 {
        self.output.transform.aspect
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub added: Vec<SourceId>,
    /// Files dropped because the batch was full.
    pub truncated: usize,
}

/// What the crop surface should show after a confirm.
#[derive(Debug, Clone, PartialEq)]
pub enum CropAdvance {
    Next(SourceImage),
    Finished,
}

pub struct PublishPipeline {
    config: PipelineConfig,
    state: PublishState,
    target: PublishTarget,
    aspect: f64,
    filter: FilterSpec,
    caption: String,
    next_id: u32,
    sources: Vec<SourceImage>,
    queue: VecDeque<SourceId>,
    completed: Vec<CroppedImage>,
    previews: PreviewRegistry,
    upload: Option<UploadProgress>,
    last_error: Option<PublishError>,
}

impl Default for PublishPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl PublishPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let config = config.validated();
        Self {
            aspect: config.feed_preset.aspect,
            config,
            state: PublishState::Selecting,
            target: PublishTarget::Feed,
            filter: FilterSpec::None,
            caption: String::new(),
            next_id: 0,
            sources: Vec::new(),
            queue: VecDeque::new(),
            completed: Vec::new(),
            previews: PreviewRegistry::new(),
            upload: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    pub fn target(&self) -> PublishTarget {
        self.target
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    pub fn filter(&self) -> FilterSpec {
        self.filter
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Selected images in selection order.
    pub fn sources(&self) -> &[SourceImage] {
        &self.sources
    }

    /// Confirmed crops in display order.
    pub fn completed(&self) -> &[CroppedImage] {
        &self.completed
    }

    /// Images still waiting for a crop, next first.
    pub fn pending(&self) -> Vec<SourceId> {
        self.queue.iter().copied().collect()
    }

    /// Error that moved the pipeline to `Failed`, if any.
    pub fn last_error(&self) -> Option<&PublishError> {
        self.last_error.as_ref()
    }

    fn invalid_state(&self, action: &'static str) -> PublishError {
        PublishError::InvalidState {
            action,
            state: self.state.name(),
        }
    }

    fn require_editable(&self, action: &'static str) -> Result<(), PublishError> {
        if self.state.is_editable() {
            Ok(())
        } else {
            Err(self.invalid_state(action))
        }
    }

    fn transition(&mut self, next: PublishState) {
        if self.state != next {
            log::debug!("publish {} -> {}", self.state.name(), next.name());
            self.state = next;
        }
    }

    /// Pick the editing state that matches the queue.
    fn settle(&mut self) {
        let next = if self.sources.is_empty() {
            PublishState::Selecting
        } else if self.queue.is_empty() {
            PublishState::Reviewing
        } else {
            PublishState::Cropping
        };
        self.transition(next);
    }

    /// Add picked files to the batch.
    ///
    /// Files past the image cap are dropped and reported in
    /// [`SelectionOutcome::truncated`]; that is not an error.
    pub fn add_images(
        &mut self,
        files: Vec<SelectedFile>,
    ) -> Result<SelectionOutcome, PublishError> {
        match self.state {
            PublishState::Selecting | PublishState::Cropping | PublishState::Reviewing => {}
            _ => return Err(self.invalid_state("add images")),
        }

        let room = self.config.max_images.saturating_sub(self.sources.len());
        let truncated = files.len().saturating_sub(room);
        if truncated > 0 {
            log::warn!(
                "only {} images per post; dropped {} of the selection",
                self.config.max_images,
                truncated
            );
        }

        let mut added = Vec::new();
        for file in files.into_iter().take(room) {
            self.next_id += 1;
            let id = SourceId(self.next_id);
            self.sources.push(SourceImage::new(id, file.name, file.bytes));
            self.queue.push_back(id);
            added.push(id);
        }

        self.settle();
        Ok(SelectionOutcome { added, truncated })
    }

    fn source(&self, id: SourceId) -> Option<&SourceImage> {
        self.sources.iter().find(|source| source.id() == id)
    }

    /// Next image to crop.
    pub fn current(&self) -> Option<&SourceImage> {
        self.queue.front().and_then(|id| self.source(*id))
    }

    /// Crop preset for the current target at the current aspect.
    pub fn crop_preset(&self) -> CropPreset {
        let base = match self.target {
            PublishTarget::Feed => self.config.feed_preset,
            PublishTarget::Story => self.config.story_preset,
        };
        CropPreset::new(self.aspect, base.output_width)
    }

    /// Crop surface loaded with the next image.
    pub fn open_surface(&self) -> Result<CropSurface, PublishError> {
        if self.state != PublishState::Cropping {
            return Err(self.invalid_state("open the crop surface"));
        }
        let source = self
            .current()
            .ok_or_else(|| self.invalid_state("open the crop surface"))?;

        let mut surface = CropSurface::new(SurfaceOptions::from_config(
            &self.config,
            self.crop_preset(),
        ));
        match surface.load(source) {
            Ok(()) => Ok(surface),
            Err(SurfaceError::Decode(e)) => Err(PublishError::Decode(e)),
            Err(SurfaceError::Encode(e)) => Err(PublishError::Encode(e)),
            Err(SurfaceError::NotReady) => Err(self.invalid_state("open the crop surface")),
        }
    }

    /// Accept the crop of the queue head and advance.
    pub fn confirm_crop(&mut self, output: CropOutput) -> Result<CropAdvance, PublishError> {
        if self.state != PublishState::Cropping {
            return Err(self.invalid_state("confirm a crop"));
        }
        if self.queue.front() != Some(&output.source_id) {
            return Err(ValidationError::NotQueueHead {
                source_id: output.source_id,
            }
            .into());
        }
        if !aspects_match(output.transform.aspect, self.aspect) {
            return Err(ValidationError::AspectMismatch {
                source_id: output.source_id,
                expected: self.aspect,
                actual: output.transform.aspect,
            }
            .into());
        }

        self.queue.pop_front();
        let preview = self.previews.issue();
        log::debug!(
            "cropped {} ({} of {})",
            output.source_id,
            self.completed.len() + 1,
            self.sources.len()
        );
        self.completed.push(CroppedImage { output, preview });

        self.settle();
        Ok(match self.current() {
            Some(next) => CropAdvance::Next(next.clone()),
            None => CropAdvance::Finished,
        })
    }

    /// Drop one image from the batch, wherever it is.
    ///
    /// Returns false if the id is not part of the batch.
    pub fn remove_image(&mut self, id: SourceId) -> Result<bool, PublishError> {
        self.require_editable("remove an image")?;

        let Some(index) = self.sources.iter().position(|source| source.id() == id) else {
            return Ok(false);
        };
        self.sources.remove(index);
        self.queue.retain(|queued| *queued != id);
        if let Some(pos) = self.completed.iter().position(|c| c.source_id() == id) {
            let removed = self.completed.remove(pos);
            self.previews.release(removed.preview);
        }

        log::debug!("removed {} from the batch", id);
        self.last_error = None;
        self.settle();
        Ok(true)
    }

    /// Switch between feed and story.
    ///
    /// Story forces the 9:16 aspect. Going back to feed restores the feed
    /// default only if the story aspect is still selected.
    pub fn set_target(&mut self, target: PublishTarget) -> Result<(), PublishError> {
        self.require_editable("change the target")?;
        self.target = target;
        let aspect = match target {
            PublishTarget::Story => STORY_ASPECT,
            PublishTarget::Feed if aspects_match(self.aspect, STORY_ASPECT) => {
                self.config.feed_preset.aspect
            }
            PublishTarget::Feed => self.aspect,
        };
        self.apply_aspect(aspect);
        Ok(())
    }

    pub fn set_aspect(&mut self, aspect: f64) -> Result<(), PublishError> {
        self.require_editable("change the aspect")?;
        if !aspect.is_finite() || aspect <= 0.0 {
            return Err(ValidationError::InvalidAspect { aspect }.into());
        }
        if self.target == PublishTarget::Story && !aspects_match(aspect, STORY_ASPECT) {
            return Err(ValidationError::StoryAspect { aspect }.into());
        }
        self.apply_aspect(aspect);
        Ok(())
    }

    /// Adopt a new aspect, sending crops made at another aspect back to the
    /// queue. Returns how many were invalidated.
    fn apply_aspect(&mut self, aspect: f64) -> usize {
        if aspects_match(self.aspect, aspect) {
            return 0;
        }
        self.aspect = aspect;

        let before = self.completed.len();
        let previews = &mut self.previews;
        self.completed.retain(|cropped| {
            let keep = aspects_match(cropped.aspect(), aspect);
            if !keep {
                previews.release(cropped.preview);
            }
            keep
        });
        let invalidated = before - self.completed.len();

        // Rebuild in selection order from the retained sources
        let completed = &self.completed;
        self.queue = self
            .sources
            .iter()
            .map(SourceImage::id)
            .filter(|id| !completed.iter().any(|c| c.source_id() == *id))
            .collect();

        if invalidated > 0 {
            log::debug!(
                "aspect changed to {:.4}; {} crop(s) need redoing",
                aspect,
                invalidated
            );
            self.last_error = None;
        }
        if self.state != PublishState::Failed || invalidated > 0 {
            self.settle();
        }
        invalidated
    }

    /// Filter applied to every image at upload time.
    pub fn set_filter(&mut self, filter: FilterSpec) -> Result<(), PublishError> {
        self.require_editable("change the filter")?;
        self.filter = filter;
        Ok(())
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) -> Result<(), PublishError> {
        self.require_editable("change the caption")?;
        self.caption = caption.into();
        Ok(())
    }

    /// Check the batch against the target's constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sources.is_empty() {
            return Err(ValidationError::NoImages);
        }
        if !self.queue.is_empty() {
            return Err(ValidationError::CropsPending {
                pending: self.queue.len(),
            });
        }
        if self.sources.len() > self.config.max_images {
            return Err(ValidationError::TooManyImages {
                max: self.config.max_images,
            });
        }
        if self.target == PublishTarget::Story {
            if self.completed.len() != 1 {
                return Err(ValidationError::StoryImageCount {
                    count: self.completed.len(),
                });
            }
            if !aspects_match(self.aspect, STORY_ASPECT) {
                return Err(ValidationError::StoryAspect {
                    aspect: self.aspect,
                });
            }
        }
        if let Some(cropped) = self
            .completed
            .iter()
            .find(|cropped| !aspects_match(cropped.aspect(), self.aspect))
        {
            return Err(ValidationError::AspectMismatch {
                source_id: cropped.source_id(),
                expected: self.aspect,
                actual: cropped.aspect(),
            });
        }
        Ok(())
    }

    /// Validate and move to `Confirming`.
    ///
    /// Allowed from `Reviewing`, or from `Failed` to start a fresh attempt.
    /// A validation error leaves the pipeline untouched.
    pub fn confirm(&mut self) -> Result<(), PublishError> {
        match self.state {
            PublishState::Reviewing | PublishState::Failed => {}
            _ => return Err(self.invalid_state("confirm")),
        }
        self.validate()?;
        self.last_error = None;
        self.upload = None;
        self.transition(PublishState::Confirming);
        Ok(())
    }

    /// Discard the batch and start over.
    pub fn cancel(&mut self) {
        self.previews.release_all();
        self.sources.clear();
        self.queue.clear();
        self.completed.clear();
        self.upload = None;
        self.last_error = None;
        self.caption.clear();
        self.filter = FilterSpec::None;
        self.target = PublishTarget::Feed;
        self.aspect = self.config.feed_preset.aspect;
        self.transition(PublishState::Selecting);
    }

    /// Preview handles released since the last call. The host revokes the
    /// matching resources.
    pub fn released_previews(&mut self) -> Vec<PreviewHandle> {
        self.previews.drain_released()
    }

    pub fn live_previews(&self) -> usize {
        self.previews.live_count()
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::decode::DecodedImage;
    use crate::geometry::{CropRect, CropTransform};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Crop,
        Remove(usize),
        Aspect(usize),
        Target(bool),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..4).prop_map(Op::Add),
            Just(Op::Crop),
            (0usize..8).prop_map(Op::Remove),
            (0usize..3).prop_map(Op::Aspect),
            any::<bool>().prop_map(Op::Target),
        ]
    }

    fn run(pipeline: &mut PublishPipeline, op: &Op) {
        match op {
            Op::Add(n) => {
                let files = (0..*n)
                    .map(|i| SelectedFile::new(format!("{}.jpg", i), vec![0u8; 4]))
                    .collect();
                let _ = pipeline.add_images(files);
            }
            Op::Crop => {
                if let Some(id) = pipeline.current().map(SourceImage::id) {
                    let output = CropOutput {
                        source_id: id,
                        transform: CropTransform::new(pipeline.aspect()),
                        rect: CropRect::default(),
                        pixels: DecodedImage::filled(2, 2, [0, 0, 0]),
                        encoded: Vec::new(),
                    };
                    let _ = pipeline.confirm_crop(output);
                }
            }
            Op::Remove(i) => {
                if let Some(id) = pipeline.sources().get(*i).map(SourceImage::id) {
                    let _ = pipeline.remove_image(id);
                }
            }
            Op::Aspect(i) => {
                let options = pipeline.config().feed_aspect_options.clone();
                let _ = pipeline.set_aspect(options[*i % options.len()]);
            }
            Op::Target(story) => {
                let target = if *story {
                    PublishTarget::Story
                } else {
                    PublishTarget::Feed
                };
                let _ = pipeline.set_target(target);
            }
        }
    }

    proptest! {
        /// Property: every selected image is either queued or completed,
        /// completed crops match the current aspect, and live previews
        /// track completed crops one to one.
        #[test]
        fn prop_queue_invariant(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut pipeline = PublishPipeline::default();
            for op in &ops {
                run(&mut pipeline, op);

                prop_assert_eq!(
                    pipeline.pending().len() + pipeline.completed().len(),
                    pipeline.sources().len()
                );
                prop_assert!(pipeline.sources().len() <= pipeline.config().max_images);
                prop_assert_eq!(pipeline.live_previews(), pipeline.completed().len());
                for cropped in pipeline.completed() {
                    prop_assert!(aspects_match(cropped.aspect(), pipeline.aspect()));
                    prop_assert!(!pipeline.pending().contains(&cropped.source_id()));
                }

                // Completed crops stay in selection order when only the
                // queue head is ever confirmed
                let order: Vec<_> = pipeline
                    .sources()
                    .iter()
                    .map(SourceImage::id)
                    .filter(|id| pipeline.completed().iter().any(|c| c.source_id() == *id))
                    .collect();
                let completed: Vec<_> =
                    pipeline.completed().iter().map(|c| c.source_id()).collect();
                prop_assert_eq!(order, completed);

                let expected = if pipeline.sources().is_empty() {
                    PublishState::Selecting
                } else if pipeline.pending().is_empty() {
                    PublishState::Reviewing
                } else {
                    PublishState::Cropping
                };
                prop_assert_eq!(pipeline.state(), expected);
            }
        }
    }
}
