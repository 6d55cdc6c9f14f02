//! Typed repository for video asset rows.
//!
//! Rows live in a flat `videos` collection keyed by row ID. The webhook
//! path locates rows by provider correlation keys (`upload_id`,
//! `asset_id`) and may touch any row; everything user-initiated goes
//! through [`VideoRepository::get_owned`] first.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use vido_models::{
    Cursor, JobKind, RunStatus, TrackStatus, VideoAsset, VideoId, VideoPatch, VideoStatus,
    Visibility,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::page::{page_query, Page, PageItem};
use crate::types::{Document, FieldOp, Filter, Value};

/// Collection holding all video rows.
const COLLECTION: &str = "videos";

/// High value sentinel for prefix range queries.
const PREFIX_END: char = '\u{f8ff}';

impl PageItem for VideoAsset {
    fn sort_value(&self) -> chrono::DateTime<chrono::Utc> {
        self.updated_at
    }
    fn tie_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Scoping predicates for list queries. Only the filters change per call
/// site; ordering and cursor handling are shared.
#[derive(Debug, Clone, Default)]
pub struct VideoScope {
    /// Restrict to one owner (studio list)
    pub owner_id: Option<String>,
    /// Restrict to one category
    pub category_id: Option<String>,
    /// Title prefix search
    pub query: Option<String>,
    /// Restrict to a visibility (public browse)
    pub visibility: Option<Visibility>,
}

impl VideoScope {
    fn into_filter(self) -> Option<Filter> {
        let mut filters = Vec::new();
        if let Some(owner_id) = self.owner_id {
            filters.push(Filter::eq("owner_id", Value::string(owner_id)));
        }
        if let Some(category_id) = self.category_id {
            filters.push(Filter::eq("category_id", Value::string(category_id)));
        }
        if let Some(visibility) = self.visibility {
            filters.push(Filter::eq("visibility", Value::string(visibility.as_str())));
        }
        if let Some(query) = self.query {
            // Prefix match: title in [q, q + U+F8FF)
            filters.push(Filter::cmp(
                "title",
                FieldOp::GreaterThanOrEqual,
                Value::string(query.clone()),
            ));
            filters.push(Filter::cmp(
                "title",
                FieldOp::LessThan,
                Value::string(format!("{}{}", query, PREFIX_END)),
            ));
        }
        Filter::and(filters)
    }
}

/// Repository for video rows.
#[derive(Clone)]
pub struct VideoRepository {
    client: FirestoreClient,
}

impl VideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Fetch a row by ID regardless of owner (system-trusted paths only).
    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoAsset>> {
        let doc = self.client.get_document(COLLECTION, video_id.as_str()).await?;
        doc.map(|d| doc_to_video(&d)).transpose()
    }

    /// Fetch a row scoped to its owner. A row that exists but belongs to
    /// someone else is reported as absent, not as forbidden.
    pub async fn get_owned(
        &self,
        video_id: &VideoId,
        owner_id: &str,
    ) -> FirestoreResult<Option<VideoAsset>> {
        Ok(self
            .get(video_id)
            .await?
            .filter(|v| v.owner_id == owner_id))
    }

    /// Insert a new row.
    pub async fn create(&self, video: &VideoAsset) -> FirestoreResult<()> {
        self.client
            .create_document(COLLECTION, video.id.as_str(), video_to_fields(video))
            .await?;
        info!(video_id = %video.id, "Created video row");
        Ok(())
    }

    /// Locate the row created for a provider upload.
    pub async fn find_by_upload_id(&self, upload_id: &str) -> FirestoreResult<Option<VideoAsset>> {
        self.find_one(Filter::eq("upload_id", Value::string(upload_id)))
            .await
    }

    /// Locate a row by provider asset ID (track events carry no upload ID).
    pub async fn find_by_asset_id(&self, asset_id: &str) -> FirestoreResult<Option<VideoAsset>> {
        self.find_one(Filter::eq("asset_id", Value::string(asset_id)))
            .await
    }

    async fn find_one(&self, filter: Filter) -> FirestoreResult<Option<VideoAsset>> {
        let query = crate::types::StructuredQuery {
            from: vec![crate::types::CollectionSelector {
                collection_id: COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: Some(filter),
            order_by: None,
            start_at: None,
            limit: Some(1),
        };
        let docs = self.client.run_query(query).await?;
        docs.first().map(doc_to_video).transpose()
    }

    /// Write a lifecycle patch. Only the fields the state machine set are
    /// touched, plus `updated_at`.
    pub async fn apply_patch(
        &self,
        video_id: &VideoId,
        patch: &VideoPatch,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        let mut mask: Vec<&str> = Vec::new();

        if let Some(status) = patch.status {
            fields.insert("status".to_string(), Value::string(status.as_str()));
            mask.push("status");
        }
        if let Some(asset_id) = &patch.asset_id {
            fields.insert("asset_id".to_string(), Value::string(asset_id));
            mask.push("asset_id");
        }
        if let Some(playback_id) = &patch.playback_id {
            fields.insert("playback_id".to_string(), Value::string(playback_id));
            mask.push("playback_id");
        }
        if let Some(thumbnail_url) = &patch.thumbnail_url {
            fields.insert("thumbnail_url".to_string(), Value::string(thumbnail_url));
            mask.push("thumbnail_url");
        }
        if let Some(preview_url) = &patch.preview_url {
            fields.insert("preview_url".to_string(), Value::string(preview_url));
            mask.push("preview_url");
        }
        if let Some(duration_ms) = patch.duration_ms {
            fields.insert("duration_ms".to_string(), Value::integer(duration_ms));
            mask.push("duration_ms");
        }
        if let Some(track_status) = patch.track_status {
            fields.insert("track_status".to_string(), Value::string(track_status.as_str()));
            mask.push("track_status");
        }

        if mask.is_empty() {
            return Ok(());
        }

        fields.insert("updated_at".to_string(), Value::timestamp(Utc::now()));
        mask.push("updated_at");

        self.client
            .patch_document(COLLECTION, video_id.as_str(), fields, &mask)
            .await
    }

    /// Record a workflow outcome on the row (polled by clients).
    pub async fn set_job_outcome(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        status: RunStatus,
        error: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("last_job_kind".to_string(), Value::string(kind.as_str()));
        fields.insert("last_job_status".to_string(), Value::string(status.as_str()));
        fields.insert(
            "last_job_error".to_string(),
            match error {
                Some(e) => Value::string(e),
                None => Value::NullValue(()),
            },
        );
        fields.insert("updated_at".to_string(), Value::timestamp(Utc::now()));

        self.client
            .patch_document(
                COLLECTION,
                video_id.as_str(),
                fields,
                &["last_job_kind", "last_job_status", "last_job_error", "updated_at"],
            )
            .await
    }

    /// Point the row at a newly stored thumbnail.
    pub async fn set_thumbnail(
        &self,
        video_id: &VideoId,
        url: &str,
        key: &str,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("thumbnail_url".to_string(), Value::string(url));
        fields.insert("thumbnail_key".to_string(), Value::string(key));
        fields.insert("updated_at".to_string(), Value::timestamp(Utc::now()));

        self.client
            .patch_document(
                COLLECTION,
                video_id.as_str(),
                fields,
                &["thumbnail_url", "thumbnail_key", "updated_at"],
            )
            .await
    }

    /// Null out the stored thumbnail reference (cleanup step).
    pub async fn clear_thumbnail(&self, video_id: &VideoId) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("thumbnail_url".to_string(), Value::NullValue(()));
        fields.insert("thumbnail_key".to_string(), Value::NullValue(()));
        fields.insert("updated_at".to_string(), Value::timestamp(Utc::now()));

        self.client
            .patch_document(
                COLLECTION,
                video_id.as_str(),
                fields,
                &["thumbnail_url", "thumbnail_key", "updated_at"],
            )
            .await
    }

    /// Replace the title (title workflow).
    pub async fn set_title(&self, video_id: &VideoId, title: &str) -> FirestoreResult<()> {
        self.set_text_field(video_id, "title", title).await
    }

    /// Replace the description (description workflow).
    pub async fn set_description(&self, video_id: &VideoId, description: &str) -> FirestoreResult<()> {
        self.set_text_field(video_id, "description", description).await
    }

    async fn set_text_field(
        &self,
        video_id: &VideoId,
        field: &'static str,
        value: &str,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(field.to_string(), Value::string(value));
        fields.insert("updated_at".to_string(), Value::timestamp(Utc::now()));

        self.client
            .patch_document(COLLECTION, video_id.as_str(), fields, &[field, "updated_at"])
            .await
    }

    /// One page of a scoped list, `(updated_at desc, id desc)`.
    pub async fn list_page(
        &self,
        scope: VideoScope,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> FirestoreResult<Page<VideoAsset>> {
        let query = page_query(COLLECTION, scope.into_filter(), cursor, limit);
        let docs = self.client.run_query(query).await?;
        let rows: Vec<VideoAsset> = docs
            .iter()
            .map(doc_to_video)
            .collect::<FirestoreResult<_>>()?;
        Ok(Page::assemble(rows, limit))
    }
}

// =============================================================================
// Document mapping
// =============================================================================

fn video_to_fields(video: &VideoAsset) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), Value::string(video.id.as_str()));
    fields.insert("owner_id".to_string(), Value::string(&video.owner_id));
    fields.insert("title".to_string(), Value::string(&video.title));
    fields.insert("status".to_string(), Value::string(video.status.as_str()));
    fields.insert("duration_ms".to_string(), Value::integer(video.duration_ms));
    fields.insert(
        "visibility".to_string(),
        Value::string(video.visibility.as_str()),
    );
    fields.insert("created_at".to_string(), Value::timestamp(video.created_at));
    fields.insert("updated_at".to_string(), Value::timestamp(video.updated_at));

    let optional_strings = [
        ("description", &video.description),
        ("category_id", &video.category_id),
        ("upload_id", &video.upload_id),
        ("asset_id", &video.asset_id),
        ("playback_id", &video.playback_id),
        ("thumbnail_url", &video.thumbnail_url),
        ("thumbnail_key", &video.thumbnail_key),
        ("preview_url", &video.preview_url),
        ("last_job_error", &video.last_job_error),
    ];
    for (name, value) in optional_strings {
        if let Some(v) = value {
            fields.insert(name.to_string(), Value::string(v));
        }
    }

    if let Some(track_status) = video.track_status {
        fields.insert(
            "track_status".to_string(),
            Value::string(track_status.as_str()),
        );
    }
    if let Some(kind) = video.last_job_kind {
        fields.insert("last_job_kind".to_string(), Value::string(kind.as_str()));
    }
    if let Some(status) = video.last_job_status {
        fields.insert("last_job_status".to_string(), Value::string(status.as_str()));
    }

    fields
}

fn doc_to_video(doc: &Document) -> FirestoreResult<VideoAsset> {
    let id = doc
        .try_str("id")?
        .or_else(|| doc.id().map(|s| s.to_string()))
        .ok_or_else(|| FirestoreError::decode_error("document has no id"))?;

    Ok(VideoAsset {
        id: VideoId::from_string(id),
        owner_id: doc.get_str("owner_id")?,
        title: doc.get_str("title")?,
        description: doc.try_str("description")?,
        category_id: doc.try_str("category_id")?,
        upload_id: doc.try_str("upload_id")?,
        asset_id: doc.try_str("asset_id")?,
        status: parse_status(&doc.get_str("status")?)?,
        playback_id: doc.try_str("playback_id")?,
        thumbnail_url: doc.try_str("thumbnail_url")?,
        thumbnail_key: doc.try_str("thumbnail_key")?,
        preview_url: doc.try_str("preview_url")?,
        track_status: doc
            .try_str("track_status")?
            .as_deref()
            .map(TrackStatus::from_provider),
        duration_ms: doc.try_i64("duration_ms")?.unwrap_or(0),
        visibility: match doc.try_str("visibility")?.as_deref() {
            Some("public") => Visibility::Public,
            _ => Visibility::Private,
        },
        last_job_kind: doc
            .try_str("last_job_kind")?
            .as_deref()
            .and_then(|s| s.parse::<JobKind>().ok()),
        last_job_status: doc
            .try_str("last_job_status")?
            .as_deref()
            .and_then(parse_run_status),
        last_job_error: doc.try_str("last_job_error")?,
        created_at: doc.get_timestamp("created_at")?,
        updated_at: doc.get_timestamp("updated_at")?,
    })
}

fn parse_status(s: &str) -> FirestoreResult<VideoStatus> {
    match s {
        "waiting" => Ok(VideoStatus::Waiting),
        "processing" => Ok(VideoStatus::Processing),
        "ready" => Ok(VideoStatus::Ready),
        "errored" => Ok(VideoStatus::Errored),
        other => Err(FirestoreError::decode_error(format!(
            "unknown video status `{}`",
            other
        ))),
    }
}

fn parse_run_status(s: &str) -> Option<RunStatus> {
    match s {
        "queued" => Some(RunStatus::Queued),
        "running" => Some(RunStatus::Running),
        "completed" => Some(RunStatus::Completed),
        "failed" => Some(RunStatus::Failed),
        _ => None,
    }
}
