//! Pipeline stages for PDF layout reconstruction.
//!
//! Each submodule implements exactly one transformation step. Only
//! [`extract`] talks to pdfium; everything downstream works on plain data
//! from [`crate::model`] and is testable without a PDF.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ images ──▶ classify/assemble ──▶ markdown ──▶ postprocess
//! (path)    (pdfium)    (PNGs)     (state machine)   └─▶ rich ──▶ docx
//!
//! input ──▶ extract::rasterise ──▶ crop ──▶ package (zip)
//! ```
//!
//! 1. [`input`]     — validate the path and the `%PDF` header
//! 2. [`extract`]   — fragments and raw images per page, or cropped page
//!    rasters; runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`images`]    — filter and save embedded images as PNG
//! 4. [`classify`]  — font size and style bits → structural token
//! 5. [`assemble`]  — fragments + images → ordered headings, paragraphs, images
//! 6. [`markdown`] / [`rich`] — the two renderers; [`docx`] writes the latter
//! 7. [`crop`] / [`package`] — ratio geometry and zip archives

pub mod assemble;
pub mod classify;
pub mod crop;
#[cfg(feature = "docx")]
pub mod docx;
pub mod extract;
pub mod images;
pub mod input;
pub mod markdown;
pub mod package;
pub mod postprocess;
pub mod rich;
pub mod sanitize;
