// Document assembler - binds a dashboard and time range into a LaTeX template
use crate::application::template::{Scope, Template, TemplateError};
use crate::domain::dashboard::{Dashboard, Panel, Row};
use crate::domain::time_range::ResolvedRange;
use chrono::TimeZone;

/// An assembled LaTeX document, ready to be written to a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document(String);

impl Document {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

pub fn assemble<Tz: TimeZone>(
    dashboard: &Dashboard,
    range: &ResolvedRange<Tz>,
    template: &str,
) -> Result<Document, TemplateError>
where
    Tz::Offset: std::fmt::Display,
{
    let template = Template::parse(template)?;
    let panels = dashboard.panels.iter().map(panel_scope).collect();
    let rows = dashboard.rows.iter().map(row_scope).collect();
    let variable_list = dashboard
        .variables
        .entries()
        .map(|(name, value)| {
            Scope::new()
                .with("name", escape_latex(name))
                .with("value", escape_latex(&value))
        })
        .collect();

    let scope = Scope::new()
        .with("title", escape_latex(&dashboard.title))
        .with("description", escape_latex(&dashboard.description))
        .with("variables", escape_latex(&dashboard.variable_values()))
        .with("from", range.from_formatted())
        .with("to", range.to_formatted())
        .with_list("panels", panels)
        .with_list("rows", rows)
        .with_list("variable_list", variable_list);

    template.render(&scope).map(Document)
}

fn panel_scope(panel: &Panel) -> Scope {
    Scope::new()
        .with("id", panel.id.to_string())
        .with("title", escape_latex(&panel.title))
        .with("type", escape_latex(&panel.panel_type))
        .with("image", panel.image_stem())
        .with("image_file", panel.image_file_name())
        .with("width", panel.width_fraction().to_string())
        .with("height", panel.grid_height().to_string())
        .with("partial_width", panel.is_partial_width())
        .with("single_stat", panel.is_single_stat())
}

fn row_scope(row: &Row) -> Scope {
    Scope::new()
        .with("title", escape_latex(&row.title))
        .with("visible", row.is_visible())
        .with_list("panels", row.panels.iter().map(panel_scope).collect())
}

/// Escape the characters LaTeX treats as markup.
pub fn escape_latex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash "),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde "),
            '^' => out.push_str("\\textasciicircum "),
            _ => out.push(c),
        }
    }
    out
}
