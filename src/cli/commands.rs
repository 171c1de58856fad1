use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use time::OffsetDateTime;
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::config::AppConfig;
use crate::dataset::{Dataset, DatasetLoader};
use crate::engine::dates::format_day;
use crate::engine::{
    normalize_items, Granularity, ItemKind, Lane, RenderCoordinator, RenderFrame, RenderSink, Rgb,
    TagCatalog, Tick,
};

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Timeline to open (defaults to the configured default timeline)
    #[arg()]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TagsArgs {
    /// Timeline name
    #[arg()]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Timeline name
    #[arg()]
    pub name: String,
    /// Zoom in pixels per day (clamped to the configured bounds)
    #[arg(long)]
    pub zoom: Option<f64>,
    /// Horizontal scroll offset in pixels
    #[arg(long)]
    pub scroll: Option<f64>,
    /// Viewport width in pixels; also used to pick the initial zoom
    #[arg(long)]
    pub width: Option<f64>,
    /// Only show items carrying one of these tags (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Print JSON (default when stdout is not a terminal)
    #[arg(long)]
    pub json: bool,
}

pub fn run_viewer(config: Arc<AppConfig>, datasets: &DatasetLoader, args: ViewArgs) -> Result<()> {
    let dataset = datasets.load_with_fallback(args.name.as_deref());
    let mut app = App::new(config, dataset)?;
    app.run()
}

pub fn list_timelines(datasets: &DatasetLoader) -> Result<()> {
    let names = datasets.list_available()?;
    print!("{}", format_timeline_list(&names));
    Ok(())
}

pub fn show_tags(datasets: &DatasetLoader, args: TagsArgs) -> Result<()> {
    let dataset = datasets
        .load(&args.name)
        .with_context(|| format!("loading timeline '{}'", args.name))?;
    let normalized = normalize_items(dataset.records, OffsetDateTime::now_utc());
    let catalog = TagCatalog::from_items(&normalized.items);
    print!("{}", format_tag_catalog(&dataset.title, &catalog));
    Ok(())
}

pub fn print_layout(config: Arc<AppConfig>, datasets: &DatasetLoader, args: LayoutArgs) -> Result<()> {
    let dataset = datasets
        .load(&args.name)
        .with_context(|| format!("loading timeline '{}'", args.name))?;
    let json = args.json || !atty::is(atty::Stream::Stdout);
    let report = build_layout_report(&config, dataset, &args, OffsetDateTime::now_utc());
    if json {
        let out = serde_json::to_string_pretty(&report).context("serializing layout")?;
        println!("{out}");
    } else {
        print!("{}", format_layout_report(&report));
    }
    Ok(())
}

/// Counts frames for the log; the report reads the final layout directly.
#[derive(Debug, Default)]
struct HeadlessSink {
    frames: usize,
}

impl RenderSink for HeadlessSink {
    fn emit(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        tracing::trace!(cause = ?frame.cause, ops = frame.ops.len(), "headless frame");
    }
}

#[derive(Debug, Serialize)]
struct LayoutReport {
    timeline: String,
    zoom: f64,
    granularity: Option<Granularity>,
    content_width: f64,
    scroll_left: f64,
    viewport_width: f64,
    above_levels: usize,
    below_levels: usize,
    total_items: usize,
    rejected: usize,
    items: Vec<ItemRow>,
    ticks: Vec<Tick>,
}

#[derive(Debug, Serialize)]
struct ItemRow {
    id: String,
    title: String,
    kind: ItemKind,
    lane: Lane,
    level: usize,
    start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<String>,
    x: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    offset: f64,
    color: Rgb,
    tags: Vec<String>,
}

fn build_layout_report(
    config: &AppConfig,
    dataset: Dataset,
    args: &LayoutArgs,
    now: OffsetDateTime,
) -> LayoutReport {
    let mut engine_config = config.engine.clone();
    if let Some(width) = args.width.filter(|w| w.is_finite() && *w > 0.0) {
        engine_config.container_width = width;
    }
    let mut engine = RenderCoordinator::new(dataset.records, engine_config, now, HeadlessSink::default());

    if !args.tags.is_empty() {
        for tag in args.tags.iter().filter(|tag| !engine.catalog().contains(tag)) {
            tracing::warn!(tag = %tag, timeline = %dataset.name, "tag not used by any item");
        }
        engine.set_active_tags(args.tags.iter().cloned());
    }
    if let Some(zoom) = args.zoom {
        engine.set_zoom(zoom);
    }
    if let Some(scroll) = args.scroll {
        engine.set_scroll(scroll);
    }
    tracing::debug!(frames = engine.sink().frames, "headless layout done");

    let layout = engine.layout();
    let items = layout
        .items
        .iter()
        .filter_map(|descriptor| {
            let item = engine.item(&descriptor.id)?;
            Some(ItemRow {
                id: descriptor.id.to_string(),
                title: item.title.clone(),
                kind: item.kind,
                lane: descriptor.lane,
                level: descriptor.stack_level,
                start: format_day(item.start),
                end: item.end.map(format_day),
                x: descriptor.start_px,
                width: descriptor.width,
                offset: descriptor.offset,
                color: descriptor.color,
                tags: item.tags.clone(),
            })
        })
        .collect();

    LayoutReport {
        timeline: dataset.title,
        zoom: engine.zoom(),
        granularity: layout.granularity,
        content_width: layout.content_width,
        scroll_left: engine.view().scroll_left,
        viewport_width: engine.view().viewport_width,
        above_levels: layout.above_levels,
        below_levels: layout.below_levels,
        total_items: engine.items().len(),
        rejected: engine.rejected().len(),
        items,
        ticks: layout.ticks.clone(),
    }
}

fn format_timeline_list(names: &[String]) -> String {
    if names.is_empty() {
        return "No timelines found.\n".to_string();
    }
    let mut out = String::new();
    for name in names {
        let _ = writeln!(&mut out, "{name}");
    }
    out
}

fn format_tag_catalog(title: &str, catalog: &TagCatalog) -> String {
    const UNTAGGED: &str = "(untagged)";
    let mut out = String::new();
    let _ = writeln!(&mut out, "{title}");
    if catalog.is_empty() && catalog.untagged_count() == 0 {
        let _ = writeln!(&mut out, "  (no items)");
        return out;
    }
    let width = catalog
        .names()
        .map(UnicodeWidthStr::width)
        .chain([UNTAGGED.width()])
        .max()
        .unwrap_or(0);
    let mut line = |name: &str, count: usize| {
        let pad = width.saturating_sub(name.width());
        let _ = writeln!(&mut out, "  {name}{:pad$}  {count:>4}", "");
    };
    for tag in catalog.iter() {
        line(&tag.name, tag.count);
    }
    if catalog.untagged_count() > 0 {
        line(UNTAGGED, catalog.untagged_count());
    }
    out
}

fn format_layout_report(report: &LayoutReport) -> String {
    let mut out = String::new();
    let granularity = report
        .granularity
        .map(|g| g.to_string())
        .unwrap_or_else(|| "-".into());
    let _ = writeln!(
        &mut out,
        "{}  zoom {:.3} px/day  {}  {}/{} items",
        report.timeline,
        report.zoom,
        granularity,
        report.items.len(),
        report.total_items
    );
    let _ = writeln!(
        &mut out,
        "content {:.0}px  scroll {:.0}px  viewport {:.0}px  levels {} above / {} below",
        report.content_width,
        report.scroll_left,
        report.viewport_width,
        report.above_levels,
        report.below_levels
    );
    if report.rejected > 0 {
        let _ = writeln!(&mut out, "{} record(s) dropped, see log", report.rejected);
    }
    out.push('\n');
    for row in &report.items {
        let span = match &row.end {
            Some(end) => format!("{} .. {}", row.start, end),
            None => row.start.clone(),
        };
        let width = row
            .width
            .map(|w| format!("{w:.0}"))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            &mut out,
            "{:<5} {:>2}  x={:<9.1} w={:<6} {}  {}  {}",
            row.lane.as_ref(),
            row.level,
            row.x,
            width,
            row.color,
            span,
            row.title
        );
    }
    if !report.ticks.is_empty() {
        let labels: Vec<_> = report.ticks.iter().map(|t| t.label.as_str()).collect();
        let _ = writeln!(&mut out, "\nticks: {}", labels.join(" | "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TimelineItem;
    use time::macros::datetime;

    fn dataset() -> Dataset {
        let records: Vec<TimelineItem> = serde_json::from_value(serde_json::json!([
            {"id": "p", "title": "Renaissance", "type": "period", "start": "1400", "end": "1600", "tags": ["b", "a"]},
            {"id": "e", "title": "Printing press", "type": "event", "start": "1440", "tags": ["c"]},
            {"id": "u", "title": "Untagged", "type": "event", "start": "1500"}
        ]))
        .expect("records");
        Dataset {
            name: "demo".into(),
            title: "Demo Timeline".into(),
            records,
            skipped: 0,
        }
    }

    fn args() -> LayoutArgs {
        LayoutArgs {
            name: "demo".into(),
            zoom: None,
            scroll: None,
            width: Some(120.0),
            tags: Vec::new(),
            json: true,
        }
    }

    #[test]
    fn tag_catalog_lists_counts_in_first_seen_order() {
        let normalized = normalize_items(dataset().records, datetime!(2024-01-01 0:00 UTC));
        let catalog = TagCatalog::from_items(&normalized.items);
        insta::assert_snapshot!(format_tag_catalog("Demo Timeline", &catalog), @r###"
        Demo Timeline
          b              1
          a              1
          c              1
          (untagged)     1
        "###);
    }

    #[test]
    fn layout_report_respects_tag_selection() {
        let config = AppConfig::default();
        let mut args = args();
        args.tags = vec!["c".into()];
        let report = build_layout_report(&config, dataset(), &args, datetime!(2024-01-01 0:00 UTC));
        let ids: Vec<_> = report.items.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["e", "u"]);
        assert_eq!(report.total_items, 3);
        assert_eq!(report.viewport_width, 120.0);
    }

    #[test]
    fn layout_report_serializes_descriptors() -> Result<()> {
        let config = AppConfig::default();
        let mut args = args();
        args.zoom = Some(1_000.0);
        let report = build_layout_report(&config, dataset(), &args, datetime!(2024-01-01 0:00 UTC));
        let value = serde_json::to_value(&report)?;
        assert_eq!(value["zoom"], serde_json::json!(200.0));
        assert_eq!(value["granularity"], "day");
        let period = &value["items"][0];
        assert_eq!(period["lane"], "above");
        assert_eq!(period["kind"], "period");
        assert_eq!(period["end"], "1600-01-01");
        assert!(period["color"].as_str().is_some_and(|c| c.starts_with('#')));
        Ok(())
    }

    #[test]
    fn text_report_mentions_every_visible_item() {
        let config = AppConfig::default();
        let report = build_layout_report(&config, dataset(), &args(), datetime!(2024-01-01 0:00 UTC));
        let text = format_layout_report(&report);
        assert!(text.starts_with("Demo Timeline"));
        for title in ["Renaissance", "Printing press", "Untagged"] {
            assert!(text.contains(title), "missing {title}");
        }
    }

    #[test]
    fn empty_listing_says_so() {
        assert_eq!(format_timeline_list(&[]), "No timelines found.\n");
        assert_eq!(format_timeline_list(&["art".into()]), "art\n");
    }
}
