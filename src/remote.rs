//! Blocking client for the remote geometry service that computes
//! intersections and raster statistics.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use reqwest::{
    StatusCode,
    blocking::{Client, Response, multipart::Form},
    header::CONTENT_DISPOSITION,
    redirect::Policy,
};
use serde::Deserialize;

use crate::{
    common::PendingWrite,
    config::Settings,
    context::SpatialContext,
    error::RegionalError,
};

/// Files, intersections and raster statistics known to the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// `(name, sha256, kind)` of every uploaded file.
    pub files: Vec<(String, String, String)>,
    /// `(first sha256, second sha256)` of computed intersections.
    pub intersections: Vec<(String, String)>,
    /// `(vector sha256, raster sha256)` of computed raster statistics.
    pub rasterstats: Vec<(String, String)>,
}

impl Catalog {
    pub fn has_file(&self, sha256: &str) -> bool {
        self.files.iter().any(|(_, hash, _)| hash == sha256)
    }
}

/// State of a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Failed,
    Finished,
    /// The service no longer knows the job.
    Forgotten,
    Running(String),
}

impl JobStatus {
    fn parse(text: &str) -> Self {
        match text.trim() {
            "failed" => JobStatus::Failed,
            "finished" => JobStatus::Finished,
            "forgotten" => JobStatus::Forgotten,
            other => JobStatus::Running(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool { !matches!(self, JobStatus::Running(_)) }
}

/// A job enqueued on the service.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub url: String,
    client: Client,
}

impl PendingJob {
    pub fn status(&self) -> Result<JobStatus> {
        let resp = self.client.get(&self.url).send()
            .map_err(|e| RegionalError::RemoteUnreachable(format!("{}: {e}", self.url)))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(JobStatus::Forgotten);
        }
        let resp = check_status(resp)?;
        Ok(JobStatus::parse(&resp.text()?))
    }

    /// Poll every `interval` until the job ends or `cancel` is set. The
    /// remote job keeps running after a cancellation.
    pub fn poll(&self, interval: Duration, cancel: &AtomicBool) -> Result<JobStatus> {
        poll_until(&self.url, interval, cancel, || self.status())
    }
}

/// Failed status checks are retried on the next tick; once `cancel` is set
/// the failure is returned instead.
fn poll_until(
    url: &str,
    interval: Duration,
    cancel: &AtomicBool,
    mut status: impl FnMut() -> Result<JobStatus>,
) -> Result<JobStatus> {
    let tick = interval.min(Duration::from_millis(200));
    loop {
        let cancelled = cancel.load(Ordering::Relaxed);
        match status() {
            Ok(current) if current.is_terminal() || cancelled => {
                tracing::info!(url, status = ?current, "job poll ended");
                return Ok(current);
            }
            Ok(_) => {}
            Err(e) if cancelled => return Err(e),
            Err(e) => tracing::warn!(url, error = %e, "job status check failed"),
        }
        let started = Instant::now();
        while started.elapsed() < interval {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(tick);
        }
    }
}

pub struct RemoteClient {
    base: String,
    client: Client,
    download_dir: PathBuf,
    poll_interval: Duration,
}

impl RemoteClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("regional-lcia/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base: settings.remote_base().to_string(),
            client,
            download_dir: settings.data_dir.join("downloads"),
            poll_interval: settings.poll_interval(),
        })
    }

    pub fn url(&self) -> &str { &self.base }

    pub fn poll_interval(&self) -> Duration { self.poll_interval }

    fn endpoint(&self, path: &str) -> String { format!("{}{path}", self.base) }

    /// True if the service answers `GET /` with 200.
    pub fn alive(&self) -> bool {
        matches!(self.client.get(&self.base).send(), Ok(resp) if resp.status() == StatusCode::OK)
    }

    fn require_alive(&self) -> Result<()> {
        if !self.alive() {
            return Err(RegionalError::RemoteUnreachable(self.base.clone()).into());
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<Catalog> {
        self.require_alive()?;
        let resp = check_status(self.client.get(self.endpoint("/catalog")).send()?)?;
        serde_json::from_slice(&resp.bytes()?).context("Failed to parse catalog")
    }

    /// Upload the source file of a geo- or topocollection.
    pub fn upload(&self, ctx: &SpatialContext, collection: &str) -> Result<serde_json::Value> {
        let dataset = ctx.dataset(collection)?;
        let path = dataset.require_source(collection)?;
        let sha256 = collection_hash(ctx, collection)?;
        if !dataset.is_raster() {
            dataset.require_field(collection)?;
        }
        if self.catalog()?.has_file(&sha256) {
            return Err(RegionalError::AlreadyExists(format!("file {sha256}")).into());
        }

        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = if dataset.is_raster() { "raster" } else { "vector" };
        let form = Form::new()
            .text("layer", dataset.layer.clone().unwrap_or_default())
            .text("field", dataset.field.clone().unwrap_or_default())
            .text("band", dataset.band.map(|b| b.to_string()).unwrap_or_default())
            .text("sha256", sha256)
            .text("kind", kind)
            .text("name", name)
            .file("file", path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        tracing::info!(collection, path = %path.display(), "uploading");
        let resp = check_status(self.client.post(self.endpoint("/upload")).multipart(form).send()?)?;
        serde_json::from_slice(&resp.bytes()?).context("Failed to parse upload response")
    }

    /// Upload whichever of the collections the service doesn't have yet.
    fn ensure_uploaded(&self, ctx: &SpatialContext, collections: &[&str]) -> Result<()> {
        let catalog = self.catalog()?;
        for &collection in collections {
            if !catalog.has_file(&collection_hash(ctx, collection)?) {
                self.upload(ctx, collection)?;
            }
        }
        Ok(())
    }

    fn submit(&self, path: &str, form: &[(&str, &str)]) -> Result<PendingJob> {
        let resp = self.client.post(self.endpoint(path)).form(form).send()?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(RegionalError::AlreadyExists(format!("job at {path}")).into());
        }
        let job = check_status(resp)?.text()?;
        tracing::info!(endpoint = path, job = %job, "job submitted");
        Ok(PendingJob { url: self.endpoint(job.trim()), client: self.client.clone() })
    }

    /// Submit the intersection of two collections, uploading them if needed.
    pub fn calculate_intersection(&self, ctx: &SpatialContext, first: &str, second: &str) -> Result<PendingJob> {
        self.require_alive()?;
        let (a, b) = (collection_hash(ctx, first)?, collection_hash(ctx, second)?);
        self.ensure_uploaded(ctx, &[first, second])?;
        self.submit("/calculate-intersection", &[("first", a.as_str()), ("second", b.as_str())])
    }

    /// Submit raster statistics of `raster` over the features of `vector`.
    pub fn calculate_rasterstats(&self, ctx: &SpatialContext, vector: &str, raster: &str) -> Result<PendingJob> {
        self.require_alive()?;
        let (v, r) = (collection_hash(ctx, vector)?, collection_hash(ctx, raster)?);
        self.ensure_uploaded(ctx, &[vector, raster])?;
        self.submit("/calculate-rasterstats", &[("vector", v.as_str()), ("raster", r.as_str())])
    }

    /// Download a computed intersection and import it. Returns the created
    /// pairs; nothing is downloaded if the intersection already exists.
    pub fn intersection(&self, ctx: &mut SpatialContext, first: &str, second: &str) -> Result<Vec<(String, String)>> {
        if ctx.has_intersection(first, second) {
            tracing::warn!(first, second, "skipping existing intersection");
            return Ok(Vec::new());
        }
        self.require_alive()?;
        let (a, b) = (collection_hash(ctx, first)?, collection_hash(ctx, second)?);
        let path = self.download("/intersection", &[("first", a.as_str()), ("second", b.as_str())])?;
        Ok(ctx.import_exchange(&path)?.intersections().to_vec())
    }

    /// Download computed raster statistics; returns the file path.
    pub fn rasterstats(&self, ctx: &SpatialContext, vector: &str, raster: &str) -> Result<PathBuf> {
        self.require_alive()?;
        let (v, r) = (collection_hash(ctx, vector)?, collection_hash(ctx, raster)?);
        self.download("/rasterstats", &[("vector", v.as_str()), ("raster", r.as_str())])
    }

    fn download(&self, path: &str, form: &[(&str, &str)]) -> Result<PathBuf> {
        let resp = self.client.post(self.endpoint(path)).form(form).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RegionalError::NotYetCalculated(format!("{path} {form:?}")).into());
        }
        let mut resp = check_status(resp)?;
        let name = resp.headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .with_context(|| format!("{path} response has no attachment file name"))?;
        let target = self.download_dir.join(name);

        let mut sink = PendingWrite::open(&target, true)?;
        std::io::copy(&mut resp, &mut sink)
            .with_context(|| format!("write {}", target.display()))?;
        let target = sink.finalize()?;
        tracing::info!(path = %target.display(), "downloaded");
        Ok(target)
    }
}

fn collection_hash(ctx: &SpatialContext, name: &str) -> Result<String> {
    ctx.dataset(name)?.sha256.clone()
        .ok_or_else(|| RegionalError::MissingSpatialSourceData(name.to_string()).into())
}

fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(RegionalError::RemoteStatus { status: status.as_u16(), body }.into())
}

/// File name of an `attachment; filename=…` header, without any directory.
fn attachment_filename(header: &str) -> Option<String> {
    let value = header.split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    let name = Path::new(value).file_name()?.to_string_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_names() {
        assert_eq!(attachment_filename("attachment; filename=a.json.gz").as_deref(), Some("a.json.gz"));
        assert_eq!(attachment_filename("attachment; filename=\"b.json\"").as_deref(), Some("b.json"));
        assert_eq!(attachment_filename("attachment; filename=../../etc/c.json").as_deref(), Some("c.json"));
        assert_eq!(attachment_filename("inline"), None);
    }

    #[test]
    fn job_status_parsing() {
        assert_eq!(JobStatus::parse("finished\n"), JobStatus::Finished);
        assert!(JobStatus::parse("failed").is_terminal());
        assert!(!JobStatus::parse("queued").is_terminal());
    }

    #[test]
    fn failed_status_checks_are_retried() {
        let cancel = AtomicBool::new(false);
        let mut answers = vec![Ok(JobStatus::Finished), Ok(JobStatus::Running("queued".into())), Err(anyhow::anyhow!("connection reset"))];
        let status = poll_until("job", Duration::from_millis(1), &cancel, || answers.pop().unwrap()).unwrap();
        assert_eq!(status, JobStatus::Finished);
        assert!(answers.is_empty());
    }

    #[test]
    fn failed_status_check_after_cancel_is_returned() {
        let cancel = AtomicBool::new(true);
        let err = poll_until("job", Duration::from_millis(1), &cancel, || Err(anyhow::anyhow!("connection reset"))).unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn catalog_lookup() {
        let catalog: Catalog = serde_json::from_str(r#"{"files": [["a.gpkg", "abc", "vector"]]}"#).unwrap();
        assert!(catalog.has_file("abc"));
        assert!(!catalog.has_file("def"));
        assert!(catalog.intersections.is_empty());
    }

    #[test]
    fn collections_without_files_have_no_hash() {
        let mut ctx = SpatialContext::in_memory();
        ctx.register_geocollection("rest-of-world", crate::meta::DatasetSpec::default()).unwrap();
        let err = collection_hash(&ctx, "rest-of-world").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegionalError>(),
            Some(RegionalError::MissingSpatialSourceData(_))
        ));
    }
}
