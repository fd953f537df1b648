//! Upload and record steps of the publish pipeline.
//!
//! Uploading is split into steps so an async host can run the uploads
//! itself, possibly concurrently:
//!
//! 1. [`PublishPipeline::begin_upload`] filters and encodes every image and
//!    returns the plan with storage keys in display order.
//! 2. [`PublishPipeline::record_upload`] reports each upload's result.
//! 3. [`PublishPipeline::finish_uploads`] builds the record to insert.
//! 4. [`PublishPipeline::record_persisted`] reports the insert's result.
//!
//! [`PublishPipeline::publish`] drives the same steps synchronously. A
//! failed attempt is not rolled back: keys that were already uploaded are
//! reported as orphaned and no record is created.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{PublishPipeline, PublishState, PublishTarget};
use crate::backend::{storage_key, BackendError, NewRecord, ObjectStorage, RecordId, RecordStore};
use crate::encode::{encode_jpeg, EncodeError, JPEG_CONTENT_TYPE};
use crate::error::PublishError;
use crate::filter::apply_filter;

/// Who is publishing, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishContext {
    pub user_id: String,
    /// Used for storage keys and story expiry.
    pub now: DateTime<Utc>,
}

impl PublishContext {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            now,
        }
    }
}

/// One object to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// Display position, starting at 0.
    pub position: usize,
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub bucket: String,
    pub uploads: Vec<PendingUpload>,
}

impl UploadPlan {
    /// Storage keys in display order.
    pub fn keys(&self) -> Vec<String> {
        self.uploads.iter().map(|upload| upload.key.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub record_id: RecordId,
    pub target: PublishTarget,
    pub bucket: String,
    /// Storage keys in display order.
    pub keys: Vec<String>,
}

pub(super) struct UploadProgress {
    context: PublishContext,
    bucket: String,
    keys: Vec<String>,
    uploaded: Vec<bool>,
    record: Option<NewRecord>,
}

impl UploadProgress {
    fn uploaded_keys(&self) -> Vec<String> {
        self.keys
            .iter()
            .zip(&self.uploaded)
            .filter(|(_, done)| **done)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn remaining(&self) -> usize {
        self.uploaded.iter().filter(|done| !**done).count()
    }
}

impl PublishPipeline {
    fn fail(&mut self, error: PublishError) -> PublishError {
        log::warn!("publish failed: {}", error);
        self.upload = None;
        self.last_error = Some(error.clone());
        self.transition(PublishState::Failed);
        error
    }

    fn bucket(&self) -> &str {
        match self.target {
            PublishTarget::Feed => &self.config.feed_bucket,
            PublishTarget::Story => &self.config.story_bucket,
        }
    }

    /// Filter and encode every image and assign storage keys.
    pub fn begin_upload(&mut self, context: &PublishContext) -> Result<UploadPlan, PublishError> {
        if self.state != PublishState::Confirming {
            return Err(self.invalid_state("start uploading"));
        }

        let encoded: Result<Vec<Vec<u8>>, EncodeError> = self
            .completed
            .iter()
            .map(|cropped| {
                let filtered = apply_filter(&cropped.output.pixels, self.filter);
                encode_jpeg(&filtered, self.config.publish_quality)
            })
            .collect();
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.fail(e.into())),
        };

        let uploads = encoded
            .into_iter()
            .enumerate()
            .map(|(position, bytes)| PendingUpload {
                position,
                key: storage_key(&context.user_id, context.now, position),
                bytes,
                content_type: JPEG_CONTENT_TYPE,
            })
            .collect();
        let plan = UploadPlan {
            bucket: self.bucket().to_string(),
            uploads,
        };
        log::debug!(
            "uploading {} image(s) to {} with filter {}",
            plan.uploads.len(),
            plan.bucket,
            self.filter
        );
        self.upload = Some(UploadProgress {
            context: context.clone(),
            bucket: plan.bucket.clone(),
            keys: plan.keys(),
            uploaded: vec![false; plan.uploads.len()],
            record: None,
        });
        self.transition(PublishState::Uploading);
        Ok(plan)
    }

    /// Report the result of uploading the image at `position`.
    ///
    /// The first failure ends the attempt. Uploads of that attempt that
    /// finish afterwards are still accepted: a success adds its key to the
    /// failure's orphaned list, a failure changes nothing.
    pub fn record_upload(
        &mut self,
        position: usize,
        result: Result<(), BackendError>,
    ) -> Result<(), PublishError> {
        if self.state == PublishState::Failed && self.upload.is_some() {
            return self.record_late_upload(position, result);
        }
        if self.state != PublishState::Uploading {
            return Err(self.invalid_state("record an upload"));
        }
        let Some(progress) = self.upload.as_mut() else {
            return Err(self.invalid_state("record an upload"));
        };
        if position >= progress.keys.len() || progress.record.is_some() {
            return Err(self.invalid_state("record an upload"));
        }

        match result {
            Ok(()) => {
                progress.uploaded[position] = true;
                Ok(())
            }
            Err(e) => {
                let error = PublishError::Upload {
                    position,
                    key: progress.keys[position].clone(),
                    reason: e.to_string(),
                    orphaned: progress.uploaded_keys(),
                };
                let progress = self.upload.take();
                let error = self.fail(error);
                self.upload = progress;
                Err(error)
            }
        }
    }

    fn record_late_upload(
        &mut self,
        position: usize,
        result: Result<(), BackendError>,
    ) -> Result<(), PublishError> {
        let Some(progress) = self.upload.as_mut() else {
            return Err(self.invalid_state("record an upload"));
        };
        if position >= progress.keys.len() || progress.uploaded[position] {
            return Err(self.invalid_state("record an upload"));
        }
        if result.is_err() {
            return Ok(());
        }

        progress.uploaded[position] = true;
        let key = progress.keys[position].clone();
        log::warn!("upload of {} finished after the attempt failed", key);
        if let Some(PublishError::Upload { orphaned, .. }) = self.last_error.as_mut() {
            orphaned.push(key);
        }
        Ok(())
    }

    /// Build the record once every upload has succeeded.
    pub fn finish_uploads(&mut self) -> Result<NewRecord, PublishError> {
        if self.state != PublishState::Uploading {
            return Err(self.invalid_state("finish uploading"));
        }
        let target = self.target;
        let ttl = self.config.story_ttl_hours;
        let caption = self.caption.clone();
        let Some(progress) = self.upload.as_mut() else {
            return Err(self.invalid_state("finish uploading"));
        };
        let remaining = progress.remaining();
        if remaining > 0 {
            return Err(PublishError::UploadsPending { remaining });
        }

        let user_id = progress.context.user_id.clone();
        let record = match target {
            PublishTarget::Feed => NewRecord::post(user_id, caption, progress.keys.clone()),
            PublishTarget::Story => {
                let key = progress.keys.first().cloned().unwrap_or_default();
                NewRecord::story(user_id, key, progress.context.now, ttl)
            }
        };
        progress.record = Some(record.clone());
        Ok(record)
    }

    /// Report the result of inserting the record.
    pub fn record_persisted(
        &mut self,
        result: Result<RecordId, BackendError>,
    ) -> Result<PublishReceipt, PublishError> {
        let ready = self.state == PublishState::Uploading
            && self
                .upload
                .as_ref()
                .is_some_and(|progress| progress.record.is_some());
        if !ready {
            return Err(self.invalid_state("save the post"));
        }
        let Some(progress) = self.upload.take() else {
            return Err(self.invalid_state("save the post"));
        };

        match result {
            Ok(record_id) => {
                let receipt = PublishReceipt {
                    record_id,
                    target: self.target,
                    bucket: progress.bucket,
                    keys: progress.keys,
                };
                log::info!(
                    "published {} image(s) as {:?} {}",
                    receipt.keys.len(),
                    receipt.target,
                    receipt.record_id.0
                );
                self.finish();
                Ok(receipt)
            }
            Err(e) => Err(self.fail(PublishError::Persist {
                reason: e.to_string(),
                orphaned: progress.keys,
            })),
        }
    }

    /// Drop every raster and preview of the submitted batch.
    fn finish(&mut self) {
        self.previews.release_all();
        self.sources.clear();
        self.queue.clear();
        self.completed.clear();
        self.last_error = None;
        self.transition(PublishState::Done);
    }

    /// Run the whole publish sequentially against the given backends.
    ///
    /// Confirms first when called from `Reviewing` or `Failed`.
    pub fn publish(
        &mut self,
        context: &PublishContext,
        storage: &dyn ObjectStorage,
        records: &dyn RecordStore,
    ) -> Result<PublishReceipt, PublishError> {
        if matches!(self.state, PublishState::Reviewing | PublishState::Failed) {
            self.confirm()?;
        }

        let plan = self.begin_upload(context)?;
        for upload in &plan.uploads {
            let result = storage.upload(
                &plan.bucket,
                &upload.key,
                &upload.bytes,
                upload.content_type,
            );
            self.record_upload(upload.position, result)?;
        }

        let record = self.finish_uploads()?;
        let result = records.insert(&record);
        self.record_persisted(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::super::tests::{crop_all, crop_next, files, small_config};
    use super::*;
    use crate::backend::testing::{MemoryRecords, MemoryStorage};
    use crate::backend::parse_image_paths;
    use crate::decode::decode_image;
    use crate::error::ValidationError;
    use crate::filter::FilterSpec;
    use crate::source::SourceId;

    fn context() -> PublishContext {
        PublishContext::new("user-7", Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    fn reviewed(count: usize) -> PublishPipeline {
        let mut pipeline = PublishPipeline::new(small_config());
        pipeline.add_images(files(count)).unwrap();
        crop_all(&mut pipeline);
        pipeline
    }

    #[test]
    fn test_publish_feed_post() {
        let mut pipeline = reviewed(3);
        pipeline.set_caption("sunset").unwrap();
        let storage = MemoryStorage::default();
        let records = MemoryRecords::default();

        let receipt = pipeline.publish(&context(), &storage, &records).unwrap();
        assert_eq!(
            receipt.keys,
            vec![
                "user-7-1700000000000-0.jpg",
                "user-7-1700000000000-1.jpg",
                "user-7-1700000000000-2.jpg"
            ]
        );
        assert_eq!(receipt.bucket, "post-images");
        assert_eq!(receipt.record_id, RecordId("posts-1".into()));

        let rows = records.rows.borrow();
        assert_eq!(rows.len(), 1);
        match &rows[0] {
            NewRecord::Post {
                user_id,
                caption,
                image_paths,
            } => {
                assert_eq!(user_id, "user-7");
                assert_eq!(caption, "sunset");
                assert_eq!(image_paths, &receipt.keys);
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(parse_image_paths(&rows[0].image_path_column()), receipt.keys);
        assert_eq!(storage.keys("post-images").len(), 3);

        assert_eq!(pipeline.state(), PublishState::Done);
        assert!(pipeline.completed().is_empty());
        assert_eq!(pipeline.live_previews(), 0);
        assert_eq!(pipeline.released_previews().len(), 3);
    }

    #[test]
    fn test_story_example_recrop_then_submit() {
        // Three images cropped for the feed
        let mut pipeline = reviewed(3);
        assert_eq!(pipeline.completed().len(), 3);

        // Switching to story forces every image back through the crop surface
        pipeline.set_target(PublishTarget::Story).unwrap();
        assert_eq!(pipeline.state(), PublishState::Cropping);
        assert!(pipeline.completed().is_empty());
        assert_eq!(pipeline.pending().len(), 3);

        // Drop two, recrop the remaining one at 9:16
        pipeline.remove_image(SourceId(2)).unwrap();
        pipeline.remove_image(SourceId(3)).unwrap();
        crop_next(&mut pipeline);
        assert_eq!(pipeline.state(), PublishState::Reviewing);

        let storage = MemoryStorage::default();
        let records = MemoryRecords::default();
        let receipt = pipeline.publish(&context(), &storage, &records).unwrap();

        assert_eq!(receipt.keys, vec!["user-7-1700000000000-0.jpg"]);
        assert_eq!(receipt.bucket, "stories");
        let rows = records.rows.borrow();
        assert_eq!(rows.len(), 1);
        match &rows[0] {
            NewRecord::Story {
                image_path,
                expires_at,
                ..
            } => {
                assert_eq!(image_path, "user-7-1700000000000-0.jpg");
                assert_eq!(expires_at, "2023-11-15T22:13:20.000Z");
            }
            other => panic!("unexpected record {:?}", other),
        }

        let stored = storage
            .objects
            .borrow()
            .get(&("stories".to_string(), receipt.keys[0].clone()))
            .cloned()
            .unwrap();
        let decoded = decode_image(&stored).unwrap();
        assert_eq!((decoded.width, decoded.height), (27, 48));
    }

    #[test]
    fn test_story_validation_happens_before_network() {
        let mut pipeline = PublishPipeline::new(small_config());
        pipeline.set_target(PublishTarget::Story).unwrap();
        pipeline.add_images(files(2)).unwrap();
        crop_all(&mut pipeline);

        let storage = MemoryStorage::default();
        let records = MemoryRecords::default();
        let err = pipeline.publish(&context(), &storage, &records).unwrap_err();

        assert_eq!(
            err,
            PublishError::Validation(ValidationError::StoryImageCount { count: 2 })
        );
        assert!(storage.calls.borrow().is_empty());
        assert!(records.rows.borrow().is_empty());
        assert_eq!(pipeline.state(), PublishState::Reviewing);
    }

    #[test]
    fn test_partial_upload_failure_leaves_orphans_and_no_record() {
        let mut pipeline = reviewed(5);
        let storage = MemoryStorage {
            fail_on_call: Some(2),
            ..Default::default()
        };
        let records = MemoryRecords::default();

        let err = pipeline.publish(&context(), &storage, &records).unwrap_err();
        match &err {
            PublishError::Upload {
                position,
                key,
                orphaned,
                ..
            } => {
                assert_eq!(*position, 2);
                assert_eq!(key, "user-7-1700000000000-2.jpg");
                assert_eq!(
                    orphaned,
                    &vec![
                        "user-7-1700000000000-0.jpg".to_string(),
                        "user-7-1700000000000-1.jpg".to_string()
                    ]
                );
            }
            other => panic!("unexpected error {:?}", other),
        }
        // Uploads stop at the failure
        assert_eq!(storage.calls.borrow().len(), 3);
        assert!(records.rows.borrow().is_empty());
        assert_eq!(pipeline.state(), PublishState::Failed);
        assert_eq!(pipeline.last_error(), Some(&err));
        // Crops are kept for a manual retry
        assert_eq!(pipeline.completed().len(), 5);
    }

    #[test]
    fn test_retry_after_failure_is_a_fresh_attempt() {
        let mut pipeline = reviewed(2);
        let failing = MemoryStorage {
            fail_on_call: Some(0),
            ..Default::default()
        };
        let records = MemoryRecords::default();
        assert!(pipeline.publish(&context(), &failing, &records).is_err());

        let later = PublishContext::new("user-7", Utc.timestamp_millis_opt(1_700_000_005_000).unwrap());
        let storage = MemoryStorage::default();
        let receipt = pipeline.publish(&later, &storage, &records).unwrap();
        assert_eq!(receipt.keys[0], "user-7-1700000005000-0.jpg");
        assert_eq!(records.rows.borrow().len(), 1);
    }

    #[test]
    fn test_persist_failure_orphans_every_upload() {
        let mut pipeline = reviewed(2);
        let storage = MemoryStorage::default();
        let records = MemoryRecords {
            fail: true,
            ..Default::default()
        };

        let err = pipeline.publish(&context(), &storage, &records).unwrap_err();
        assert_eq!(err.orphaned_keys().len(), 2);
        assert!(matches!(err, PublishError::Persist { .. }));
        assert_eq!(storage.keys("post-images").len(), 2);
        assert_eq!(pipeline.state(), PublishState::Failed);
    }

    #[test]
    fn test_step_api_accepts_out_of_order_completion() {
        let mut pipeline = reviewed(3);
        pipeline.confirm().unwrap();
        let plan = pipeline.begin_upload(&context()).unwrap();
        assert_eq!(pipeline.state(), PublishState::Uploading);
        assert!(plan.uploads.iter().all(|u| u.content_type == "image/jpeg"));

        pipeline.record_upload(2, Ok(())).unwrap();
        assert_eq!(
            pipeline.finish_uploads().unwrap_err(),
            PublishError::UploadsPending { remaining: 2 }
        );
        pipeline.record_upload(0, Ok(())).unwrap();
        pipeline.record_upload(1, Ok(())).unwrap();

        let record = pipeline.finish_uploads().unwrap();
        assert_eq!(record.image_keys(), plan.keys());
        let receipt = pipeline
            .record_persisted(Ok(RecordId("p1".into())))
            .unwrap();
        assert_eq!(receipt.keys, plan.keys());
        assert_eq!(pipeline.state(), PublishState::Done);
    }

    #[test]
    fn test_uploads_finishing_after_failure_are_orphaned() {
        let mut pipeline = reviewed(4);
        pipeline.confirm().unwrap();
        pipeline.begin_upload(&context()).unwrap();

        pipeline.record_upload(0, Ok(())).unwrap();
        let err = pipeline
            .record_upload(1, Err(BackendError::new("timeout")))
            .unwrap_err();
        assert_eq!(err.orphaned_keys(), ["user-7-1700000000000-0.jpg"]);
        assert_eq!(pipeline.state(), PublishState::Failed);

        // Still in flight when the first failure arrived
        pipeline.record_upload(3, Ok(())).unwrap();
        pipeline
            .record_upload(2, Err(BackendError::new("timeout")))
            .unwrap();
        assert!(pipeline.record_upload(3, Ok(())).is_err());
        assert!(pipeline.record_upload(9, Ok(())).is_err());

        let last = pipeline.last_error().unwrap();
        assert_eq!(
            last.orphaned_keys(),
            ["user-7-1700000000000-0.jpg", "user-7-1700000000000-3.jpg"]
        );
        assert_eq!(pipeline.state(), PublishState::Failed);
        assert!(pipeline.finish_uploads().is_err());

        // A fresh attempt drops the stale progress
        pipeline.confirm().unwrap();
        assert!(pipeline.record_upload(3, Ok(())).is_err());
    }

    #[test]
    fn test_steps_rejected_out_of_sequence() {
        let mut pipeline = reviewed(1);
        assert!(matches!(
            pipeline.begin_upload(&context()),
            Err(PublishError::InvalidState { .. })
        ));
        assert!(pipeline.record_upload(0, Ok(())).is_err());
        assert!(pipeline.finish_uploads().is_err());
        assert!(pipeline.record_persisted(Ok(RecordId("x".into()))).is_err());

        pipeline.confirm().unwrap();
        pipeline.begin_upload(&context()).unwrap();
        assert!(pipeline.record_upload(5, Ok(())).is_err());
        assert!(pipeline.record_persisted(Ok(RecordId("x".into()))).is_err());
    }

    #[test]
    fn test_filter_applied_at_upload_only() {
        let mut plain = reviewed(1);
        let mut mono = reviewed(1);
        mono.set_filter(FilterSpec::Mono).unwrap();
        let unfiltered = mono.completed()[0].output.pixels.clone();

        plain.confirm().unwrap();
        mono.confirm().unwrap();
        let a = plain.begin_upload(&context()).unwrap();
        let b = mono.begin_upload(&context()).unwrap();
        assert_ne!(a.uploads[0].bytes, b.uploads[0].bytes);
        // The retained crop is never filtered in place
        assert_eq!(mono.completed()[0].output.pixels, unfiltered);

        let decoded = decode_image(&b.uploads[0].bytes).unwrap();
        let [r, g, bl] = decoded.pixel(10, 10).unwrap();
        assert!(r.abs_diff(g) <= 3 && g.abs_diff(bl) <= 3);
    }

    #[test]
    fn test_upload_bytes_are_deterministic() {
        let mut a = reviewed(1);
        let mut b = reviewed(1);
        a.set_filter(FilterSpec::Vintage).unwrap();
        b.set_filter(FilterSpec::Vintage).unwrap();
        a.confirm().unwrap();
        b.confirm().unwrap();
        let plan_a = a.begin_upload(&context()).unwrap();
        let plan_b = b.begin_upload(&context()).unwrap();
        assert_eq!(plan_a, plan_b);
    }
}
