//! Deflate zip packaging.
//!
//! Two archives are produced here:
//!
//! * the Markdown package: `{base}.md` plus every image the Markdown
//!   references, and a `missing_images.txt` listing references that could
//!   not be found;
//! * the page-image archive of the crop target: one `page_{:03}.png` per page.

use crate::error::ConvertError;
use crate::output::PackageOutput;
use image::{DynamicImage, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Name of the archive member listing unresolved image references.
pub const MISSING_IMAGES_FILE: &str = "missing_images.txt";

// `![alt](<dest with spaces>)` or `![alt](dest "title")`
static RE_IMAGE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[[^\]]*\]\(\s*(?:<([^>\n]+)>|([^)\s]+))(?:\s+[^)]*)?\)").unwrap()
});

/// Image file names referenced by `markdown`, in order of first appearance.
///
/// Any directory prefix is reduced to the file name; remote URLs are ignored.
pub fn referenced_images(markdown: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in RE_IMAGE_REF.captures_iter(markdown) {
        let Some(target) = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()) else {
            continue;
        };
        if target.contains("://") || target.starts_with("data:") {
            continue;
        }
        let name = Path::new(target)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        if let Some(name) = name {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

fn archive_err(path: &Path, e: impl std::fmt::Display) -> ConvertError {
    ConvertError::ArchiveFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Scratch path an archive is written to before it is renamed into place.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn create_output(path: &Path) -> Result<(File, PathBuf), ConvertError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    let tmp = partial_path(path);
    let file = File::create(&tmp).map_err(|e| ConvertError::OutputWriteFailed {
        path: tmp.clone(),
        source: e,
    })?;
    Ok((file, tmp))
}

/// Run `fill` against a zip writer on a temp file, then rename it to `output`.
///
/// The temp file is removed on any failure, so `output` is either the
/// complete archive or untouched.
fn write_archive<T>(
    output: &Path,
    fill: impl FnOnce(&mut ZipWriter<File>) -> Result<T, ConvertError>,
) -> Result<T, ConvertError> {
    let (file, tmp) = create_output(output)?;
    let result = (|| -> Result<T, ConvertError> {
        let mut zip = ZipWriter::new(file);
        let value = fill(&mut zip)?;
        zip.finish().map_err(|e| archive_err(output, e))?;
        std::fs::rename(&tmp, output).map_err(|e| ConvertError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        })?;
        Ok(value)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Zip a Markdown document together with the images it references.
pub fn package_markdown(
    markdown: &str,
    base: &str,
    images_dir: &Path,
    output: &Path,
) -> Result<PackageOutput, ConvertError> {
    let (included, missing) = write_archive(output, |zip| {
        let opts = deflated();
        zip.start_file(format!("{base}.md"), opts)
            .map_err(|e| archive_err(output, e))?;
        zip.write_all(markdown.as_bytes())
            .map_err(|e| archive_err(output, e))?;

        let mut included = Vec::new();
        let mut missing = Vec::new();
        for name in referenced_images(markdown) {
            let src = images_dir.join(&name);
            match std::fs::read(&src) {
                Ok(bytes) => {
                    zip.start_file(name.as_str(), opts)
                        .map_err(|e| archive_err(output, e))?;
                    zip.write_all(&bytes).map_err(|e| archive_err(output, e))?;
                    debug!("Packaged {}", name);
                    included.push(name);
                }
                Err(e) => {
                    warn!("Referenced image not packaged: {} ({})", src.display(), e);
                    missing.push(name);
                }
            }
        }

        if !missing.is_empty() {
            zip.start_file(MISSING_IMAGES_FILE, opts)
                .map_err(|e| archive_err(output, e))?;
            let mut listing = missing.join("\n");
            listing.push('\n');
            zip.write_all(listing.as_bytes())
                .map_err(|e| archive_err(output, e))?;
        }
        Ok((included, missing))
    })?;

    info!(
        "Packaged {} with {} image(s), {} missing",
        output.display(),
        included.len(),
        missing.len()
    );

    Ok(PackageOutput {
        path: output.to_path_buf(),
        included,
        missing,
    })
}

/// Archive member name for a cropped page.
pub fn page_image_name(page: usize) -> String {
    format!("page_{page:03}.png")
}

/// Write page images into a scratch directory and zip them to `output`.
///
/// The scratch directory is removed when this returns, whether or not the
/// archive was written. Returns the number of archived images.
pub fn zip_page_images(
    pages: &[(usize, DynamicImage)],
    output: &Path,
) -> Result<usize, ConvertError> {
    let scratch = tempfile::tempdir().map_err(|e| ConvertError::OutputWriteFailed {
        path: std::env::temp_dir(),
        source: e,
    })?;

    let mut written: Vec<(String, PathBuf)> = Vec::with_capacity(pages.len());
    for (page, img) in pages {
        let name = page_image_name(*page);
        let path = scratch.path().join(&name);
        img.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| archive_err(output, format!("{name}: {e}")))?;
        written.push((name, path));
    }

    write_archive(output, |zip| {
        let opts = deflated();
        for (name, path) in &written {
            let bytes = std::fs::read(path).map_err(|e| archive_err(output, e))?;
            zip.start_file(name.as_str(), opts)
                .map_err(|e| archive_err(output, e))?;
            zip.write_all(&bytes).map_err(|e| archive_err(output, e))?;
        }
        Ok(())
    })?;

    debug!("Archived {} page image(s) into {}", written.len(), output.display());
    Ok(written.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Read;

    fn read_member(zip_path: &Path, name: &str) -> Option<Vec<u8>> {
        let mut archive = zip::ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut member = archive.by_name(name).ok()?;
        let mut buf = Vec::new();
        member.read_to_end(&mut buf).unwrap();
        Some(buf)
    }

    #[test]
    fn finds_references_in_order() {
        let md = "![Image 1](a_page1_img1.png)\n\ntext ![x](imgs/b.png) ![again](a_page1_img1.png)\n![r](https://host/c.png)";
        assert_eq!(referenced_images(md), vec!["a_page1_img1.png", "b.png"]);
    }

    #[test]
    fn bracketed_references_keep_spaces() {
        let md = "![Image 1](<annual report_page1_img1.png>)\n![t](<dir/b c.png> \"title\")";
        assert_eq!(
            referenced_images(md),
            vec!["annual report_page1_img1.png", "b c.png"]
        );
    }

    #[test]
    fn package_with_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("imgs");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("present.png"), b"fake png").unwrap();

        let md = "# T\n\n![Image 1](present.png)\n\n![Image 2](gone.png)";
        let out_path = dir.path().join("out").join("doc.zip");
        let out = package_markdown(md, "doc", &images, &out_path).unwrap();

        assert_eq!(out.included, vec!["present.png"]);
        assert_eq!(out.missing, vec!["gone.png"]);
        assert_eq!(read_member(&out_path, "doc.md").unwrap(), md.as_bytes());
        assert_eq!(read_member(&out_path, "present.png").unwrap(), b"fake png");
        assert_eq!(
            read_member(&out_path, MISSING_IMAGES_FILE).unwrap(),
            b"gone.png\n"
        );
    }

    #[test]
    fn package_without_missing_has_no_listing() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("plain.zip");
        let out = package_markdown("just text", "plain", dir.path(), &out_path).unwrap();
        assert!(out.included.is_empty() && out.missing.is_empty());
        assert!(read_member(&out_path, MISSING_IMAGES_FILE).is_none());
    }

    #[test]
    fn page_images_are_zipped() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 4, Rgb([0, 0, 0])));
        let out_path = dir.path().join("pages.zip");
        let n = zip_page_images(&[(1, img.clone()), (12, img)], &out_path).unwrap();
        assert_eq!(n, 2);

        let mut archive = zip::ZipArchive::new(File::open(&out_path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["page_001.png", "page_012.png"]);
        assert!(!partial_path(&out_path).exists());
    }

    #[test]
    fn failed_archive_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("broken.zip");
        let err = write_archive(&out_path, |_| -> Result<(), ConvertError> {
            Err(archive_err(&out_path, "boom"))
        })
        .unwrap_err();
        assert!(matches!(err, ConvertError::ArchiveFailed { .. }));
        assert!(!out_path.exists());
        assert!(!partial_path(&out_path).exists());
    }

    #[test]
    fn failed_rewrite_keeps_previous_archive() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("kept.zip");
        package_markdown("first", "kept", dir.path(), &out_path).unwrap();
        let before = std::fs::read(&out_path).unwrap();

        let _ = write_archive(&out_path, |zip| -> Result<(), ConvertError> {
            zip.start_file("partial.md", deflated())
                .map_err(|e| archive_err(&out_path, e))?;
            Err(archive_err(&out_path, "interrupted"))
        });
        assert_eq!(std::fs::read(&out_path).unwrap(), before);
        assert!(!partial_path(&out_path).exists());
    }
}
