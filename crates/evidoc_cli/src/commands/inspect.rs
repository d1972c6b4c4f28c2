//! `evidoc inspect`

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::json;

use evidoc_core::assembly::{find_picture_slots, measure_unit};
use evidoc_core::config::ConfigManager;
use evidoc_core::engine::{DocumentEngine, DocxEngine, SessionGuard};

use super::resolve_template;

#[derive(Args)]
pub struct InspectCommand {
    /// Template document (default: resolved from settings)
    #[arg(long)]
    template: Option<PathBuf>,
}

impl InspectCommand {
    pub fn execute(self, config: &ConfigManager, json: bool) -> Result<bool> {
        let settings = config.settings();
        let template = resolve_template(self.template.as_deref(), settings)?;
        let marker = settings.template.picture_marker.as_str();

        let engine = DocxEngine::new();
        let mut guard = SessionGuard::new(
            engine
                .open(&template)
                .with_context(|| format!("Opening {}", template.display()))?,
        );
        let session = guard.session()?;

        let pages = session.page_count();
        let slots = find_picture_slots(session, marker, None)?;
        let unit = measure_unit(session, marker)?;
        guard.release();

        let mut per_page: BTreeMap<u32, usize> = BTreeMap::new();
        for slot in &slots {
            *per_page.entry(slot.page).or_default() += 1;
        }

        if json {
            let value = json!({
                "template": template,
                "pages": pages,
                "slots": slots.len(),
                "slots_per_page": per_page,
                "cloneable_unit": unit.map(|u| json!({ "slots": u.slots })),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(true);
        }

        println!("Template: {}", template.display());
        println!("Pages: {}", pages);
        println!("Picture slots: {}", slots.len());
        for (page, count) in &per_page {
            println!("  page {}: {}", page, count);
        }
        match unit {
            Some(unit) => println!("Cloneable unit: table with {} slot(s)", unit.slots),
            None => println!("Cloneable unit: none (no table holds {})", marker),
        }
        Ok(true)
    }
}
