//! Publish pipeline WASM bindings.
//!
//! The browser owns the network, so uploads run in JavaScript through the
//! pipeline's step API:
//!
//! ```typescript
//! const pipeline = new JsPublishPipeline({ max_images: 7 });
//! pipeline.add_images(files.map((f, i) => ({ name: f.name, bytes: buffers[i] })));
//!
//! while (pipeline.state === 'cropping') {
//!   const surface = pipeline.open_surface();
//!   // ...user frames the image...
//!   pipeline.confirm_crop(surface);
//! }
//!
//! pipeline.confirm();
//! const plan = pipeline.begin_upload(userId);
//! await Promise.all(plan.uploads.map(async (u) => {
//!   const { error } = await storage.from(plan.bucket).upload(u.key, pipeline.upload_bytes(u.position));
//!   pipeline.record_upload(u.position, error?.message);
//! }));
//! const { table, ...row } = pipeline.finish_uploads();
//! const { data, error } = await db.from(table).insert(row).select('id').single();
//! const receipt = pipeline.record_persisted(data && String(data.id), error?.message);
//! ```

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use postframe_core::backend::{BackendError, RecordId};
use postframe_core::config::PipelineConfig;
use postframe_core::error::PublishError;
use postframe_core::filter::FilterSpec;
use postframe_core::pipeline::{
    CropAdvance, PublishContext, PublishPipeline, PublishTarget, SelectionOutcome, UploadPlan,
};
use postframe_core::source::{SelectedFile, SourceId};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::surface::JsCropSurface;

fn to_js(e: PublishError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[derive(Serialize)]
struct JsSelectionOutcome {
    added: Vec<u32>,
    truncated: usize,
}

#[derive(Serialize)]
struct JsPendingUpload<'a> {
    position: usize,
    key: &'a str,
    content_type: &'a str,
    byte_length: usize,
}

#[derive(Serialize)]
struct JsUploadPlan<'a> {
    bucket: &'a str,
    uploads: Vec<JsPendingUpload<'a>>,
}

fn parse_target(name: &str) -> Option<PublishTarget> {
    match name.trim().to_ascii_lowercase().as_str() {
        "feed" => Some(PublishTarget::Feed),
        "story" => Some(PublishTarget::Story),
        _ => None,
    }
}

/// Turn the host's insert outcome into a result. `None` when it reported
/// neither an id nor an error.
fn persisted_result(
    record_id: Option<String>,
    error: Option<String>,
) -> Option<Result<RecordId, BackendError>> {
    match (error, record_id) {
        (Some(message), _) => Some(Err(BackendError::new(message))),
        (None, Some(id)) if !id.trim().is_empty() => Some(Ok(RecordId(id))),
        (None, _) => None,
    }
}

fn timestamp(now_ms: Option<f64>) -> Option<DateTime<Utc>> {
    let millis = now_ms.unwrap_or_else(js_sys::Date::now);
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[wasm_bindgen]
pub struct JsPublishPipeline {
    inner: PublishPipeline,
    plan: Option<UploadPlan>,
}

#[wasm_bindgen]
impl JsPublishPipeline {
    /// Create a pipeline. `config` is an optional partial `PipelineConfig`
    /// object; missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsPublishPipeline, JsValue> {
        let config: PipelineConfig = if config.is_undefined() || config.is_null() {
            PipelineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        Ok(Self::with_config(config))
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.inner.state().name().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn target(&self) -> String {
        match self.inner.target() {
            PublishTarget::Feed => "feed",
            PublishTarget::Story => "story",
        }
        .to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn aspect(&self) -> f64 {
        self.inner.aspect()
    }

    #[wasm_bindgen(getter)]
    pub fn filter(&self) -> String {
        self.inner.filter().name().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn caption(&self) -> String {
        self.inner.caption().to_string()
    }

    /// Add `{ name, bytes }` entries to the batch. Returns
    /// `{ added: number[], truncated: number }`.
    pub fn add_images(&mut self, files: js_sys::Array) -> Result<JsValue, JsValue> {
        let mut selected = Vec::with_capacity(files.length() as usize);
        for entry in files.iter() {
            let name = js_sys::Reflect::get(&entry, &JsValue::from_str("name"))?
                .as_string()
                .unwrap_or_default();
            let bytes = js_sys::Reflect::get(&entry, &JsValue::from_str("bytes"))?;
            selected.push(SelectedFile::new(name, js_sys::Uint8Array::new(&bytes).to_vec()));
        }

        let outcome = self.add_selected(selected).map_err(to_js)?;
        let outcome = JsSelectionOutcome {
            added: outcome.added.iter().map(|id| id.0).collect(),
            truncated: outcome.truncated,
        };
        serde_wasm_bindgen::to_value(&outcome).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Id of the next image to crop.
    pub fn current_id(&self) -> Option<u32> {
        self.inner.current().map(|source| source.id().0)
    }

    pub fn current_name(&self) -> Option<String> {
        self.inner.current().map(|source| source.name().to_string())
    }

    pub fn pending_ids(&self) -> Vec<u32> {
        self.inner.pending().iter().map(|id| id.0).collect()
    }

    /// Cropped image ids in display order.
    pub fn completed_ids(&self) -> Vec<u32> {
        self.inner
            .completed()
            .iter()
            .map(|cropped| cropped.source_id().0)
            .collect()
    }

    /// Crop-quality JPEG of a completed image, for thumbnails.
    pub fn preview_jpeg(&self, id: u32) -> Option<Vec<u8>> {
        self.inner
            .completed()
            .iter()
            .find(|cropped| cropped.source_id() == SourceId(id))
            .map(|cropped| cropped.output.encoded.clone())
    }

    /// Preview handle of a completed image.
    pub fn preview_handle(&self, id: u32) -> Option<u32> {
        self.inner
            .completed()
            .iter()
            .find(|cropped| cropped.source_id() == SourceId(id))
            .map(|cropped| cropped.preview.0)
    }

    /// Crop surface loaded with the next image.
    pub fn open_surface(&self) -> Result<JsCropSurface, JsValue> {
        self.inner
            .open_surface()
            .map(JsCropSurface::from_surface)
            .map_err(to_js)
    }

    /// Confirm the surface's framing for the current image. Returns true
    /// while more images are waiting.
    pub fn confirm_crop(&mut self, surface: &JsCropSurface) -> Result<bool, JsValue> {
        let output = surface
            .confirm_output()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let advance = self.inner.confirm_crop(output).map_err(to_js)?;
        Ok(matches!(advance, CropAdvance::Next(_)))
    }

    pub fn remove_image(&mut self, id: u32) -> Result<bool, JsValue> {
        self.inner.remove_image(SourceId(id)).map_err(to_js)
    }

    /// `"feed"` or `"story"`.
    pub fn set_target(&mut self, target: &str) -> Result<(), JsValue> {
        let target = parse_target(target)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown target: {}", target)))?;
        self.inner.set_target(target).map_err(to_js)
    }

    pub fn set_aspect(&mut self, aspect: f64) -> Result<(), JsValue> {
        self.inner.set_aspect(aspect).map_err(to_js)
    }

    pub fn set_filter(&mut self, name: &str) -> Result<(), JsValue> {
        let filter = FilterSpec::from_str(name).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.inner.set_filter(filter).map_err(to_js)
    }

    pub fn set_caption(&mut self, caption: String) -> Result<(), JsValue> {
        self.inner.set_caption(caption).map_err(to_js)
    }

    /// Why the batch cannot be submitted yet, if anything.
    pub fn validation_message(&self) -> Option<String> {
        self.inner.validate().err().map(|e| e.to_string())
    }

    pub fn confirm(&mut self) -> Result<(), JsValue> {
        self.inner.confirm().map_err(to_js)
    }

    /// Filter and encode every image. Returns
    /// `{ bucket, uploads: [{ position, key, content_type, byte_length }] }`;
    /// fetch each payload with [`upload_bytes`](Self::upload_bytes).
    ///
    /// `now_ms` defaults to `Date.now()`.
    pub fn begin_upload(&mut self, user_id: String, now_ms: Option<f64>) -> Result<JsValue, JsValue> {
        let now = timestamp(now_ms).ok_or_else(|| JsValue::from_str("Invalid timestamp"))?;
        let plan = self.begin_upload_at(user_id, now).map_err(to_js)?;

        let view = JsUploadPlan {
            bucket: &plan.bucket,
            uploads: plan
                .uploads
                .iter()
                .map(|upload| JsPendingUpload {
                    position: upload.position,
                    key: &upload.key,
                    content_type: upload.content_type,
                    byte_length: upload.bytes.len(),
                })
                .collect(),
        };
        serde_wasm_bindgen::to_value(&view).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// JPEG payload for the upload at `position`.
    pub fn upload_bytes(&self, position: usize) -> Option<Vec<u8>> {
        self.plan
            .as_ref()
            .and_then(|plan| plan.uploads.get(position))
            .map(|upload| upload.bytes.clone())
    }

    /// Report an upload. Pass the error message when it failed.
    pub fn record_upload(&mut self, position: usize, error: Option<String>) -> Result<(), JsValue> {
        let result = match error {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(()),
        };
        let outcome = self.inner.record_upload(position, result);
        if outcome.is_err() {
            self.plan = None;
        }
        outcome.map_err(to_js)
    }

    /// The record to insert, once every upload succeeded.
    pub fn finish_uploads(&mut self) -> Result<JsValue, JsValue> {
        let record = self.inner.finish_uploads().map_err(to_js)?;
        self.plan = None;
        serde_wasm_bindgen::to_value(&record).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Report the insert. Pass the new row id, or the error message when it
    /// failed. Passing neither is rejected and leaves the pipeline waiting.
    pub fn record_persisted(
        &mut self,
        record_id: Option<String>,
        error: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let result = persisted_result(record_id, error)
            .ok_or_else(|| JsValue::from_str("Insert reported neither a record id nor an error"))?;
        let receipt = self.inner.record_persisted(result).map_err(to_js)?;
        serde_wasm_bindgen::to_value(&receipt).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Storage keys a failed attempt left behind.
    pub fn orphaned_keys(&self) -> Vec<JsValue> {
        self.inner
            .last_error()
            .map(|e| e.orphaned_keys().iter().map(|k| JsValue::from_str(k)).collect())
            .unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error().map(ToString::to_string)
    }

    pub fn cancel(&mut self) {
        self.plan = None;
        self.inner.cancel();
    }

    /// Preview handles to revoke (for example with `URL.revokeObjectURL`).
    pub fn released_previews(&mut self) -> Vec<u32> {
        self.inner
            .released_previews()
            .into_iter()
            .map(|handle| handle.0)
            .collect()
    }
}

impl JsPublishPipeline {
    pub(crate) fn with_config(config: PipelineConfig) -> Self {
        Self {
            inner: PublishPipeline::new(config),
            plan: None,
        }
    }

    pub(crate) fn add_selected(
        &mut self,
        files: Vec<SelectedFile>,
    ) -> Result<SelectionOutcome, PublishError> {
        self.inner.add_images(files)
    }

    /// Start the upload and keep the plan so payloads can be fetched one at
    /// a time.
    pub(crate) fn begin_upload_at(
        &mut self,
        user_id: String,
        now: DateTime<Utc>,
    ) -> Result<&UploadPlan, PublishError> {
        let plan = self
            .inner
            .begin_upload(&PublishContext::new(user_id, now))?;
        Ok(self.plan.insert(plan))
    }
}
