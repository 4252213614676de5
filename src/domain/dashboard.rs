// Dashboard domain model, decoded from Grafana's dashboard JSON
use super::variables::Variables;
use serde::Deserialize;

/// Grafana lays dashboards out on a 24 column grid.
pub const GRID_COLUMNS: u32 = 24;

const ROW_PANEL_TYPE: &str = "row";

#[derive(Debug, thiserror::Error)]
#[error("invalid dashboard JSON: {0}")]
pub struct DashboardDecodeError(#[from] serde_json::Error);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GridPos {
    #[serde(default)]
    pub h: u32,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Panel {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub panel_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "gridPos", default)]
    pub grid_pos: Option<GridPos>,
}

impl Panel {
    pub fn is_single_stat(&self) -> bool {
        self.panel_type == "singlestat"
    }

    pub fn is_text(&self) -> bool {
        self.panel_type == "text"
    }

    fn is_row(&self) -> bool {
        self.panel_type == ROW_PANEL_TYPE
    }

    /// True when the panel takes less than the full grid width.
    pub fn is_partial_width(&self) -> bool {
        self.grid_pos.is_some_and(|g| g.w < GRID_COLUMNS)
    }

    /// Fraction of the page width the panel occupies.
    pub fn width_fraction(&self) -> f64 {
        match self.grid_pos {
            Some(g) => f64::from(g.w) / f64::from(GRID_COLUMNS),
            None => 1.0,
        }
    }

    pub fn grid_height(&self) -> u32 {
        self.grid_pos.map(|g| g.h).unwrap_or(0)
    }

    /// File name stem of the panel's rendered image.
    pub fn image_stem(&self) -> String {
        format!("image{}", self.id)
    }

    pub fn image_file_name(&self) -> String {
        format!("{}.png", self.image_stem())
    }
}

/// A v4 row with the panels nested in it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "showTitle", default)]
    pub show_title: bool,
    #[serde(default)]
    pub panels: Vec<Panel>,
}

impl Row {
    /// Whether the row's title is shown on the dashboard.
    pub fn is_visible(&self) -> bool {
        self.show_title
    }
}

/// The two panel layouts Grafana has used: panels nested in rows (v4 and
/// older), or a flat list where rows are structural marker panels (v5+).
#[derive(Debug, Clone)]
enum PanelLayout {
    Rows(Vec<Row>),
    Flat(Vec<Panel>),
}

impl PanelLayout {
    /// Rows (v4 only) and every panel in render order.
    fn into_parts(self) -> (Vec<Row>, Vec<Panel>) {
        match self {
            PanelLayout::Rows(rows) => {
                let panels = rows.iter().flat_map(|r| r.panels.iter().cloned()).collect();
                (rows, panels)
            }
            PanelLayout::Flat(panels) => (Vec::new(), panels.into_iter().filter(|p| !p.is_row()).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DashboardEnvelope {
    dashboard: DashboardJson,
}

#[derive(Debug, Deserialize)]
struct DashboardJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    panels: Vec<Panel>,
}

impl DashboardJson {
    fn layout(self) -> (String, String, PanelLayout) {
        let layout = if self.rows.is_empty() {
            PanelLayout::Flat(self.panels)
        } else {
            PanelLayout::Rows(self.rows)
        };
        (self.title, self.description, layout)
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub title: String,
    pub description: String,
    /// Render order.
    pub panels: Vec<Panel>,
    /// Empty for flat (v5+) layouts.
    pub rows: Vec<Row>,
    pub variables: Variables,
}

impl Dashboard {
    pub fn new(
        title: String,
        description: String,
        panels: Vec<Panel>,
        variables: Variables,
    ) -> Self {
        Self {
            title,
            description,
            panels,
            rows: Vec::new(),
            variables,
        }
    }

    /// Decode the body of Grafana's dashboard API.
    pub fn from_json(body: &[u8], variables: Variables) -> Result<Self, DashboardDecodeError> {
        let envelope: DashboardEnvelope = serde_json::from_slice(body)?;
        let (title, description, layout) = envelope.dashboard.layout();
        let (rows, panels) = layout.into_parts();
        Ok(Self {
            rows,
            ..Self::new(title, description, panels, variables)
        })
    }

    pub fn variable_values(&self) -> String {
        self.variables.summary()
    }
}
