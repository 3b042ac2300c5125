//! Job entry points.
//!
//! Every target follows the same shape: validate the input, run the pdfium
//! stage on the blocking pool, then build the artefact. The async functions
//! return `Result<_, ConvertError>`; the `run_*` functions wrap them in a
//! private runtime and fold the result into a [`JobOutcome`], so nothing
//! escapes their boundary as an error.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::model::{AssembledDocument, ExtractedImage, PageContent, RawImage};
use crate::output::{
    ConversionStats, CropOutput, DocxOutput, JobOutcome, MarkdownOutput, PackageOutput,
};
use crate::pipeline::extract::{self, ExtractOptions};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::{assemble, images, markdown, package, rich};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// `true` when this build can write `.docx` files.
pub const RICH_DOCUMENT_AVAILABLE: bool = cfg!(feature = "docx");

// ── Shared front half ───────────────────────────────────────────────────

/// Everything both text targets need after the pdfium stage.
struct Prepared {
    input: ResolvedInput,
    assembled: AssembledDocument,
    images: Vec<ExtractedImage>,
    images_dir: Option<PathBuf>,
    page_numbers: Vec<usize>,
    stats: ConversionStats,
}

async fn prepare(pdf_path: &Path, config: &ConversionConfig) -> Result<Prepared, ConvertError> {
    let total_start = Instant::now();

    // ── Step 1: Validate input ───────────────────────────────────────────
    let input = input::resolve_input(pdf_path)?;
    info!("Starting conversion: {}", input.path.display());

    // ── Step 2: Walk pages via pdfium ────────────────────────────────────
    let opts = ExtractOptions {
        password: config.password.clone(),
        pages: config.pages.clone(),
        with_images: config.extract_images,
        progress: config.progress_callback.clone(),
    };
    let extract_start = Instant::now();
    let mut extraction = extract::extract(&input.path, &opts).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Read {} page(s) in {}ms",
        extraction.pages.len(),
        extract_duration_ms
    );

    // ── Step 3: Save images ──────────────────────────────────────────────
    let page_numbers: Vec<usize> = extraction.pages.iter().map(|p| p.page).collect();
    let raw_by_page: Vec<(usize, Vec<RawImage>)> = extraction
        .pages
        .iter_mut()
        .filter(|p| !p.images.is_empty())
        .map(|p| (p.page, std::mem::take(&mut p.images)))
        .collect();

    let mut stats = ConversionStats {
        total_pages: extraction.total_pages,
        processed_pages: extraction.pages.len(),
        fragments: extraction.fragment_count(),
        dropped_fragments: extraction.dropped_fragments,
        extract_duration_ms,
        item_errors: std::mem::take(&mut extraction.item_errors),
        ..ConversionStats::default()
    };

    let (images, images_dir) = if raw_by_page.is_empty() {
        (Vec::new(), None)
    } else {
        let dir = config
            .images_dir
            .clone()
            .unwrap_or_else(|| input.default_images_dir());
        let saved = save_images(raw_by_page, dir.clone(), input.base.clone()).await?;
        stats.skipped_images = saved.skipped;
        stats.item_errors.extend(saved.failures);
        (saved.images, Some(dir))
    };
    stats.images_extracted = images.len();

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let fragments: Vec<_> = extraction
        .pages
        .into_iter()
        .flat_map(|p: PageContent| p.fragments)
        .collect();

    if fragments.is_empty() && images.is_empty() {
        return Err(ConvertError::NoContent { path: input.path });
    }

    let mut assembled = assemble::assemble(&fragments, &images);
    assembled.page_count = stats.total_pages;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    debug!(
        "Assembled {} node(s) from {} fragment(s) and {} image(s)",
        assembled.nodes.len(),
        fragments.len(),
        images.len()
    );

    Ok(Prepared {
        input,
        assembled,
        images,
        images_dir,
        page_numbers,
        stats,
    })
}

async fn save_images(
    raw_by_page: Vec<(usize, Vec<RawImage>)>,
    dir: PathBuf,
    base: String,
) -> Result<images::PageImages, ConvertError> {
    tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&dir).map_err(|e| ConvertError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
        let mut all = images::PageImages::default();
        for (page, raws) in raw_by_page {
            let saved = images::extract_page_images(page, raws, &dir, &base);
            all.images.extend(saved.images);
            all.skipped += saved.skipped;
            all.failures.extend(saved.failures);
        }
        Ok(all)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Image task panicked: {}", e)))?
}

// ── Markdown ────────────────────────────────────────────────────────────

/// Convert a PDF to Markdown.
///
/// Images are written to [`ConversionConfig::images_dir`] (default
/// `{pdf_dir}/{base}_images`) and referenced by file name.
///
/// # Errors
/// Fatal errors only: unreadable input, pdfium failures, an empty document
/// or one with neither text nor images. Per-image failures are reported in
/// `output.stats.item_errors`.
pub async fn convert_to_markdown(
    pdf_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<MarkdownOutput, ConvertError> {
    let started = Instant::now();
    let prepared = prepare(pdf_path.as_ref(), config).await?;
    let markdown = markdown::render(&prepared.assembled);

    let mut stats = prepared.stats;
    stats.total_duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Markdown ready: {} bytes, {} image(s), {}ms",
        markdown.len(),
        prepared.images.len(),
        stats.total_duration_ms
    );

    Ok(MarkdownOutput {
        markdown,
        images: prepared.images,
        images_dir: prepared.images_dir,
        stats,
    })
}

/// Convert a PDF and write the Markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_markdown_file(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<MarkdownOutput, ConvertError> {
    let output = convert_to_markdown(pdf_path, config).await?;
    write_atomic(output_path.as_ref(), output.markdown.as_bytes()).await?;
    Ok(output)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let write_err = |e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Rich document ───────────────────────────────────────────────────────

/// Convert a PDF to a `.docx` file.
///
/// `output_path` defaults to `{pdf_dir}/{base}.docx`.
///
/// # Errors
/// [`ConvertError::RenderTargetUnavailable`] before any work when the build
/// lacks the `docx` feature; otherwise as [`convert_to_markdown`].
pub async fn convert_to_docx(
    pdf_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<DocxOutput, ConvertError> {
    if !RICH_DOCUMENT_AVAILABLE {
        return Err(ConvertError::RenderTargetUnavailable);
    }

    let started = Instant::now();
    let prepared = prepare(pdf_path.as_ref(), config).await?;
    let path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| prepared.input.dir().join(format!("{}.docx", prepared.input.base)));

    let opts = rich::RichOptions {
        title: prepared.input.base.clone(),
        max_image_width_in: config.max_image_width_in,
        pages: prepared.page_numbers.clone(),
    };
    let (document, dropped_runs) = rich::render(&prepared.assembled, &opts);
    let images_count = document.image_count();

    let out_path = path.clone();
    tokio::task::spawn_blocking(move || write_rich(&document, &out_path))
        .await
        .map_err(|e| ConvertError::Internal(format!("Writer task panicked: {}", e)))??;

    let mut stats = prepared.stats;
    stats.dropped_fragments += dropped_runs.len();
    stats.item_errors.extend(dropped_runs);
    stats.total_duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Wrote {} ({} page(s), {} image(s)) in {}ms",
        path.display(),
        prepared.page_numbers.len(),
        images_count,
        stats.total_duration_ms
    );

    Ok(DocxOutput {
        path,
        images_count,
        pages_count: stats.total_pages,
        stats,
    })
}

#[cfg(feature = "docx")]
fn write_rich(document: &rich::RichDocument, path: &Path) -> Result<(), ConvertError> {
    crate::pipeline::docx::write_docx(document, path)
}

#[cfg(not(feature = "docx"))]
fn write_rich(_document: &rich::RichDocument, _path: &Path) -> Result<(), ConvertError> {
    Err(ConvertError::RenderTargetUnavailable)
}

// ── Crop ────────────────────────────────────────────────────────────────

/// Crop every selected page to [`ConversionConfig::crop_ratio`] and zip the
/// page images.
///
/// `output_path` defaults to `{pdf_dir}/{base}_cropped_images.zip`.
pub async fn convert_to_cropped_images(
    pdf_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<CropOutput, ConvertError> {
    let input = input::resolve_input(pdf_path)?;
    info!(
        "Cropping {} to {} at {}x",
        input.path.display(),
        config.crop_ratio,
        config.render_scale
    );

    let rasterised = extract::rasterise(
        &input.path,
        config.password.as_deref(),
        &config.pages,
        config.render_scale,
        config.crop_ratio,
        config.progress_callback.clone(),
    )
    .await?;

    let path = output_path.map(Path::to_path_buf).unwrap_or_else(|| {
        input
            .dir()
            .join(format!("{}_cropped_images.zip", input.base))
    });

    let zip_path = path.clone();
    let pages = rasterised.pages;
    let images_count =
        tokio::task::spawn_blocking(move || package::zip_page_images(&pages, &zip_path))
            .await
            .map_err(|e| ConvertError::Internal(format!("Archive task panicked: {}", e)))??;

    info!("Wrote {} with {} page image(s)", path.display(), images_count);
    Ok(CropOutput {
        path,
        images_count,
        pages_count: rasterised.total_pages,
    })
}

// ── Package ─────────────────────────────────────────────────────────────

/// Zip an in-memory Markdown document with the images it references.
pub async fn package_markdown(
    markdown: &str,
    base: &str,
    images_dir: &Path,
    output_path: &Path,
) -> Result<PackageOutput, ConvertError> {
    let markdown = markdown.to_string();
    let base = base.to_string();
    let images_dir = images_dir.to_path_buf();
    let output_path = output_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        package::package_markdown(&markdown, &base, &images_dir, &output_path)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Archive task panicked: {}", e)))?
}

/// Zip a Markdown file from disk with the images it references.
///
/// `images_dir` defaults to `{md_dir}/{base}_images` and `output_path` to
/// `{md_dir}/{base}.zip`.
pub async fn package_markdown_file(
    markdown_path: impl AsRef<Path>,
    images_dir: Option<&Path>,
    output_path: Option<&Path>,
) -> Result<PackageOutput, ConvertError> {
    let md_path = markdown_path.as_ref();
    let markdown = match tokio::fs::read(md_path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied {
                path: md_path.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(ConvertError::InputNotFound {
                path: md_path.to_path_buf(),
            })
        }
    };

    let base = md_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let dir = match md_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let images_dir = images_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join(format!("{base}_images")));
    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join(format!("{base}.zip")));

    package_markdown(&markdown, &base, &images_dir, &output_path).await
}

// ── Synchronous boundary ────────────────────────────────────────────────

fn block_on<T>(fut: impl Future<Output = Result<T, ConvertError>>) -> Result<T, ConvertError> {
    // Starting a runtime on a runtime worker thread panics inside tokio.
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(ConvertError::Internal(
            "Blocking API called from inside an async runtime; use the async functions instead"
                .to_string(),
        ));
    }
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(fut)
}

/// Synchronous wrapper around [`convert_to_markdown`].
///
/// Creates a temporary tokio runtime internally. Called from inside an async
/// context it returns [`ConvertError::Internal`] instead.
pub fn convert_to_markdown_sync(
    pdf_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<MarkdownOutput, ConvertError> {
    block_on(convert_to_markdown(pdf_path, config))
}

/// Markdown job: writes `{output}` (or nothing when `None`) and never fails
/// past this boundary.
pub fn run_markdown(
    pdf_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> JobOutcome<MarkdownOutput> {
    let result = match output_path {
        Some(out) => block_on(convert_to_markdown_file(pdf_path, out, config)),
        None => block_on(convert_to_markdown(pdf_path, config)),
    };
    outcome(result, |o| {
        format!(
            "Converted {} page(s) to Markdown with {} image(s)",
            o.stats.processed_pages,
            o.images.len()
        )
    })
}

/// Rich-document job.
pub fn run_docx(
    pdf_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> JobOutcome<DocxOutput> {
    let result = block_on(convert_to_docx(pdf_path, output_path, config));
    outcome(result, |o| {
        format!(
            "Converted PDF to Word document '{}' ({} page(s), {} image(s))",
            o.path.display(),
            o.pages_count,
            o.images_count
        )
    })
}

/// Crop job.
pub fn run_crop(
    pdf_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> JobOutcome<CropOutput> {
    let ratio = config.crop_ratio;
    let result = block_on(convert_to_cropped_images(pdf_path, output_path, config));
    outcome(result, |o| {
        format!("Cropped {} page(s) to {} images", o.images_count, ratio)
    })
}

/// Package job for a Markdown file on disk.
pub fn run_package(
    markdown_path: impl AsRef<Path>,
    images_dir: Option<&Path>,
    output_path: Option<&Path>,
) -> JobOutcome<PackageOutput> {
    let result = block_on(package_markdown_file(markdown_path, images_dir, output_path));
    outcome(result, |o| {
        format!(
            "Packaged Markdown with {} image(s), {} missing",
            o.included.len(),
            o.missing.len()
        )
    })
}

fn outcome<T>(
    result: Result<T, ConvertError>,
    describe: impl FnOnce(&T) -> String,
) -> JobOutcome<T> {
    if let Err(e) = &result {
        warn!("Job failed: {}", e);
    }
    JobOutcome::from_result(result, describe)
}
