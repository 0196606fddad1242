use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::assets::decode::load_image;
use crate::assets::resolve::{AssetDirectory, MatchMode, preflight};
use crate::compose::merge::{Template, render_sheet};
use crate::compose::overlay::OverlayComposer;
use crate::config::SheetConfig;
use crate::deck::manifest::Manifest;
use crate::deck::slots::{PageGroup, SLOTS_PER_PAGE, SlotTable};
use crate::encode::assemble::{concat_pages, write_document, write_intermediates};
use crate::encode::compress::{Ghostscript, PageOutput, Recompressor, compress_page};
use crate::foundation::core::PageSize;
use crate::foundation::error::{SheetError, SheetResult, UnresolvedSlot};

/// Page-level parallelism.
#[derive(Clone, Debug, Default)]
pub struct RenderThreading {
    /// Render and compress pages on a rayon pool.
    pub parallel: bool,
    /// Pool size; `None` lets rayon decide.
    pub threads: Option<usize>,
}

/// Inputs of a card-fronts run.
#[derive(Clone, Debug)]
pub struct FrontsJob {
    pub manifest: PathBuf,
    pub assets_dir: PathBuf,
    /// Cut-line template; a blank Letter landscape page when `None`.
    pub template: Option<PathBuf>,
    pub output: PathBuf,
    /// Directory to keep per-page PDFs in.
    pub keep_pages: Option<PathBuf>,
    pub config: SheetConfig,
    pub threading: RenderThreading,
}

/// Where the card-back image comes from.
#[derive(Clone, Debug)]
pub enum BackSource {
    /// An image file given directly.
    Image(PathBuf),
    /// The manifest's `<cardback>` identity, looked up in `backs_dir`.
    Manifest { manifest: PathBuf, backs_dir: PathBuf },
}

/// Inputs of a card-backs run: one sheet with the same image at every position.
#[derive(Clone, Debug)]
pub struct BacksJob {
    pub source: BackSource,
    pub template: Option<PathBuf>,
    pub output: PathBuf,
    pub keep_pages: Option<PathBuf>,
    pub config: SheetConfig,
}

/// What a finished run produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    /// Slot table length, empty slots included.
    pub slots: usize,
    pub filled_slots: usize,
    pub unique_assets: usize,
    pub compressed_pages: usize,
    /// Slots that had an asset but could not be drawn.
    pub blank_render_failures: usize,
}

/// Recompressor described by `config`, `None` when compression is disabled.
pub fn recompressor(config: &SheetConfig) -> Option<Ghostscript> {
    config
        .compression
        .enabled
        .then(|| Ghostscript::new(config.compression.ghostscript_opts()))
}

/// Lay out every card of the manifest and write the merged document.
pub fn render_fronts(job: &FrontsJob) -> SheetResult<RunSummary> {
    let gs = recompressor(&job.config);
    render_fronts_with(job, gs.as_ref().map(|g| g as &dyn Recompressor))
}

/// [`render_fronts`] with an explicit recompression step.
///
/// Nothing is written unless every filled slot resolves to an asset.
#[tracing::instrument(skip_all, fields(manifest = %job.manifest.display()))]
pub fn render_fronts_with(
    job: &FrontsJob,
    tool: Option<&dyn Recompressor>,
) -> SheetResult<RunSummary> {
    job.config.validate()?;

    let manifest = Manifest::from_path(&job.manifest)?;
    let table = SlotTable::from_records_by(&manifest.cards, job.config.match_mode.slot_key());
    if table.is_empty() {
        return Err(SheetError::validation("manifest assigns no slots"));
    }

    let assets = AssetDirectory::scan(&job.assets_dir)?;
    let resolved = preflight(&table, &assets, job.config.match_mode.match_mode())?;
    tracing::info!(
        cards = manifest.cards.len(),
        slots = table.len(),
        filled = resolved.len(),
        pages = table.page_count(),
        "manifest resolved"
    );

    let template = load_template(job.template.as_deref())?;
    let composer = OverlayComposer::new(
        job.config.anchors(),
        job.config.target_width_pt(),
        template.page_size(),
    );
    let guides = composer.compose_guides(&job.config.guides);

    let render_page = |group: &PageGroup<'_>| -> SheetResult<(PageOutput, usize)> {
        let composed = composer.compose_cards(group, &resolved);
        let mut layers = vec![composed.overlay];
        layers.extend(guides.clone());
        let sheet = render_sheet(&template, &layers, group.index)?;
        tracing::info!(
            page = group.index + 1,
            placed = composed.placed.len(),
            blank = composed.failures.len(),
            "rendered page"
        );
        Ok((compress_page(sheet, tool), composed.failures.len()))
    };

    let groups = table.partition();
    let rendered = if job.threading.parallel {
        let pool = build_thread_pool(job.threading.threads)?;
        pool.install(|| {
            groups
                .par_iter()
                .map(render_page)
                .collect::<SheetResult<Vec<_>>>()
        })?
    } else {
        groups
            .iter()
            .map(render_page)
            .collect::<SheetResult<Vec<_>>>()?
    };

    let failures: usize = rendered.iter().map(|(_, f)| f).sum();
    let pages: Vec<PageOutput> = rendered.into_iter().map(|(p, _)| p).collect();
    finish(&pages, &job.output, job.keep_pages.as_deref())?;

    Ok(RunSummary {
        pages: pages.len(),
        slots: table.len(),
        filled_slots: resolved.len(),
        unique_assets: resolved.unique_assets(),
        compressed_pages: pages.iter().filter(|p| p.is_compressed()).count(),
        blank_render_failures: failures,
    })
}

/// Render a single sheet of card backs.
pub fn render_backs(job: &BacksJob) -> SheetResult<RunSummary> {
    let gs = recompressor(&job.config);
    render_backs_with(job, gs.as_ref().map(|g| g as &dyn Recompressor))
}

/// [`render_backs`] with an explicit recompression step.
#[tracing::instrument(skip_all, fields(output = %job.output.display()))]
pub fn render_backs_with(
    job: &BacksJob,
    tool: Option<&dyn Recompressor>,
) -> SheetResult<RunSummary> {
    job.config.validate()?;

    let path = back_image_path(&job.source)?;
    let image = Arc::new(load_image(&path)?);
    tracing::info!(file = %path.display(), "card back resolved");

    let template = load_template(job.template.as_deref())?;
    let composer = OverlayComposer::new(
        job.config.anchors(),
        job.config.target_width_pt(),
        template.page_size(),
    );
    let mut layers = vec![composer.compose_repeated(image)?];
    layers.extend(composer.compose_guides(&job.config.guides));

    let page = compress_page(render_sheet(&template, &layers, 0)?, tool);
    let compressed = usize::from(page.is_compressed());
    finish(std::slice::from_ref(&page), &job.output, job.keep_pages.as_deref())?;

    Ok(RunSummary {
        pages: 1,
        slots: SLOTS_PER_PAGE,
        filled_slots: SLOTS_PER_PAGE,
        unique_assets: 1,
        compressed_pages: compressed,
        blank_render_failures: 0,
    })
}

fn back_image_path(source: &BackSource) -> SheetResult<PathBuf> {
    let missing =
        |identity: String| SheetError::Resolution(vec![UnresolvedSlot { slot: 0, identity }]);
    match source {
        BackSource::Image(path) => {
            if path.is_file() {
                Ok(path.clone())
            } else {
                Err(missing(path.display().to_string()))
            }
        }
        BackSource::Manifest {
            manifest,
            backs_dir,
        } => {
            let manifest = Manifest::from_path(manifest)?;
            let Some(identity) = manifest.cardback else {
                return Err(SheetError::manifest("manifest names no <cardback>"));
            };
            let dir = AssetDirectory::scan(backs_dir)?;
            match dir.resolve(&identity, MatchMode::Substring) {
                Some(file) => Ok(dir.path_of(file)),
                None => Err(missing(identity)),
            }
        }
    }
}

fn load_template(path: Option<&Path>) -> SheetResult<Template> {
    match path {
        Some(path) => Template::from_path(path),
        None => {
            tracing::warn!("no template given; drawing on a blank US Letter landscape page");
            Template::blank(PageSize::LETTER_LANDSCAPE)
        }
    }
}

fn finish(pages: &[PageOutput], output: &Path, keep_pages: Option<&Path>) -> SheetResult<()> {
    if let Some(dir) = keep_pages {
        let written = write_intermediates(dir, pages)?;
        tracing::debug!(files = written.len(), dir = %dir.display(), "kept page files");
    }
    let mut doc = concat_pages(pages.iter().map(PageOutput::final_bytes))?;
    write_document(&mut doc, output)?;
    tracing::info!(pages = pages.len(), output = %output.display(), "wrote document");
    Ok(())
}

fn build_thread_pool(threads: Option<usize>) -> SheetResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SheetError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SheetError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_is_rejected() {
        assert!(build_thread_pool(Some(0)).is_err());
        assert!(build_thread_pool(Some(2)).is_ok());
    }

    #[test]
    fn compression_can_be_switched_off() {
        let mut cfg = SheetConfig::default();
        assert!(recompressor(&cfg).is_some());
        cfg.compression.enabled = false;
        assert!(recompressor(&cfg).is_none());
    }

    #[test]
    fn missing_back_image_is_unresolved() {
        let err = back_image_path(&BackSource::Image(PathBuf::from(
            "/definitely/not/here/back.png",
        )))
        .unwrap_err();
        assert_eq!(err.unresolved().len(), 1);
        assert_eq!(err.unresolved()[0].slot, 0);
    }
}
