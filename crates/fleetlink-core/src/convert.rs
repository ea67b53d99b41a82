// ── Wire ↔ domain conversion ──
//
// The wire layer carries a flat option list; the domain model groups it
// into sections. Consecutive options of the same section collapse into one
// section, and order is preserved both ways.

use fleetlink_api::models as wire;
use fleetlink_api::unit_file;

use crate::error::CoreError;
use crate::model::{Unit, UnitOption, UnitSection};

/// Group a flat option list into sections.
pub fn sections_from_options(options: Vec<wire::UnitOption>) -> Vec<UnitSection> {
    let mut sections: Vec<UnitSection> = Vec::new();
    for opt in options {
        let option = UnitOption::new(opt.name, opt.value);
        match sections.last_mut() {
            Some(last) if last.name == opt.section => last.options.push(option),
            _ => sections.push(UnitSection {
                name: opt.section,
                options: vec![option],
            }),
        }
    }
    sections
}

/// Flatten sections into the wire option list.
pub fn options_from_sections(sections: &[UnitSection]) -> Vec<wire::UnitOption> {
    sections
        .iter()
        .flat_map(|section| {
            section
                .options
                .iter()
                .map(|o| wire::UnitOption::new(&section.name, &o.name, &o.value))
        })
        .collect()
}

/// Parse unit file text into sections.
pub fn parse_unit_file(text: &str) -> Result<Vec<UnitSection>, CoreError> {
    Ok(sections_from_options(unit_file::parse(text)?))
}

/// Render sections as unit file text.
pub fn render_unit_file(sections: &[UnitSection]) -> String {
    unit_file::serialize(&options_from_sections(sections))
}

impl From<wire::Unit> for Unit {
    fn from(u: wire::Unit) -> Self {
        Self {
            name: u.name,
            desired_state: u.desired_state,
            sections: sections_from_options(u.options),
            current_state: u.current_state,
            machine_id: (!u.machine_id.is_empty()).then_some(u.machine_id),
        }
    }
}

impl From<&Unit> for wire::Unit {
    fn from(u: &Unit) -> Self {
        Self {
            name: u.name.clone(),
            options: options_from_sections(&u.sections),
            desired_state: u.desired_state,
            current_state: u.current_state,
            machine_id: u.machine_id.clone().unwrap_or_default(),
        }
    }
}
