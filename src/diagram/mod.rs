//! Typed views of the diagram records served by the plugin, and their
//! plain-text renderings.
//!
//! The plugin owns the records; unknown fields are ignored and every field
//! except the id and file name is optional.

pub mod codec;

use std::fmt::Write as _;

use serde::Deserialize;

/// One entry of `GET /api/diagrams`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSummary {
    /// Plugin-assigned diagram id.
    #[serde(default)]
    pub id: String,
    /// File name without directory.
    #[serde(default)]
    pub file_name: String,
    /// Absolute file path.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Path relative to the project root.
    #[serde(default)]
    pub relative_path: Option<String>,
    /// `svg`, `png` or `xml`.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Owning project name.
    #[serde(default)]
    pub project: Option<String>,
}

/// Body of `GET /api/diagrams`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagramList {
    /// Open diagrams.
    #[serde(default)]
    pub diagrams: Vec<DiagramSummary>,
}

impl DiagramList {
    /// Renders the list as shown to MCP clients and CLI users.
    #[must_use]
    pub fn render(&self) -> String {
        if self.diagrams.is_empty() {
            return "No diagrams are currently open in the IDE.".to_string();
        }

        let mut text = format!("Open diagrams: {}", self.diagrams.len());
        for d in &self.diagrams {
            let _ = write!(text, "\n- {} ({})", d.file_name, d.id);
            if let Some(path) = &d.file_path {
                let _ = write!(text, " {path}");
            }
        }
        text
    }
}

/// Body of `GET /api/diagrams/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramDetail {
    /// Identifying metadata.
    #[serde(flatten)]
    pub summary: DiagramSummary,
    /// Raw markup as stored on disk.
    #[serde(default)]
    pub xml: Option<String>,
    /// `<mxGraphModel>` markup, when the plugin decoded it already.
    #[serde(default)]
    pub decoded_xml: Option<String>,
}

impl DiagramDetail {
    /// Human-readable model markup, decoding locally when the plugin did not.
    #[must_use]
    pub fn decoded_markup(&self) -> Option<String> {
        self.decoded_xml
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.xml.as_deref().and_then(codec::decode_any))
    }

    /// Renders metadata followed by decoded and raw markup.
    #[must_use]
    pub fn render(&self) -> String {
        let s = &self.summary;
        let mut text = format!("Diagram: {}\nID: {}", s.file_name, s.id);
        for (label, value) in [
            ("Path", &s.file_path),
            ("File Type", &s.file_type),
            ("Project", &s.project),
        ] {
            if let Some(value) = value {
                let _ = write!(text, "\n{label}: {value}");
            }
        }
        text.push_str("\n\n");

        let decoded = self.decoded_markup();
        let raw = self.xml.as_deref().filter(|s| !s.trim().is_empty());

        if let Some(decoded) = &decoded {
            text.push_str("=== Decoded XML (mxGraphModel) ===\n");
            text.push_str(decoded);
        }
        if let Some(raw) = raw {
            if decoded.is_some() {
                text.push_str("\n\n");
            }
            text.push_str("=== Raw XML ===\n");
            text.push_str(raw);
        }
        if decoded.is_none() && raw.is_none() {
            text.push_str("(No content available)");
        }
        text
    }
}

/// Body of a successful `PUT /api/diagrams/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOutcome {
    /// Whether the plugin saved the new content.
    #[serde(default)]
    pub success: bool,
    /// Status text from the plugin.
    #[serde(default)]
    pub message: Option<String>,
}

impl UpdateOutcome {
    /// Confirmation text for diagram `id`.
    #[must_use]
    pub fn render(&self, id: &str) -> String {
        let mut text = format!("Successfully updated diagram {id}");
        if self.success {
            let message = self.message.as_deref().unwrap_or("Update completed");
            let _ = write!(text, "\nMessage: {message}");
        }
        text
    }
}

/// Body of a successful `POST /api/diagrams`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    /// Whether the plugin created and opened the file.
    #[serde(default)]
    pub success: bool,
    /// Metadata of the new diagram.
    #[serde(flatten)]
    pub summary: DiagramSummary,
}

impl CreateOutcome {
    /// Confirmation text; `requested_path` is shown when the plugin did not
    /// report a file name.
    #[must_use]
    pub fn render(&self, requested_path: &str) -> String {
        let s = &self.summary;
        let name = if s.file_name.is_empty() {
            requested_path
        } else {
            &s.file_name
        };
        let mut text = format!("Successfully created diagram: {name}");
        if self.success {
            let _ = write!(
                text,
                "\nID: {}\nFile path: {}\nFile type: {}",
                s.id,
                s.file_path.as_deref().unwrap_or(requested_path),
                s.file_type.as_deref().unwrap_or("unknown"),
            );
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn list_render_includes_every_diagram() {
        let list: DiagramList = serde_json::from_value(json!({
            "diagrams": [
                {"id": "a1", "fileName": "flow.drawio.svg", "filePath": "/p/flow.drawio.svg", "isOpen": true},
                {"id": "b2", "fileName": "arch.drawio"}
            ]
        }))
        .unwrap();

        assert_eq!(
            list.render(),
            "Open diagrams: 2\n- flow.drawio.svg (a1) /p/flow.drawio.svg\n- arch.drawio (b2)"
        );
    }

    #[test]
    fn empty_list_render() {
        let list: DiagramList = serde_json::from_value(json!({})).unwrap();
        assert_eq!(list.render(), "No diagrams are currently open in the IDE.");
    }

    #[test]
    fn detail_render_prefers_server_decoding() {
        let detail: DiagramDetail = serde_json::from_value(json!({
            "id": "a1",
            "fileName": "flow.drawio",
            "filePath": "/p/flow.drawio",
            "fileType": "xml",
            "project": "demo",
            "xml": "<mxfile/>",
            "decodedXml": "<mxGraphModel/>"
        }))
        .unwrap();

        let text = detail.render();
        assert!(text.starts_with("Diagram: flow.drawio\nID: a1\nPath: /p/flow.drawio\nFile Type: xml\nProject: demo\n\n"));
        assert!(text.contains("=== Decoded XML (mxGraphModel) ===\n<mxGraphModel/>"));
        assert!(text.ends_with("=== Raw XML ===\n<mxfile/>"));
    }

    #[test]
    fn detail_render_decodes_plain_model_locally() {
        let detail: DiagramDetail = serde_json::from_value(json!({
            "id": "a1",
            "fileName": "flow.drawio",
            "xml": "<mxGraphModel><root/></mxGraphModel>"
        }))
        .unwrap();
        assert_eq!(
            detail.decoded_markup().as_deref(),
            Some("<mxGraphModel><root/></mxGraphModel>")
        );
    }

    #[test]
    fn detail_without_content() {
        let detail: DiagramDetail =
            serde_json::from_value(json!({"id": "a1", "fileName": "x.drawio"})).unwrap();
        assert!(detail.render().ends_with("(No content available)"));
    }

    #[test]
    fn update_render() {
        let ok = UpdateOutcome {
            success: true,
            message: None,
        };
        assert_eq!(
            ok.render("a1"),
            "Successfully updated diagram a1\nMessage: Update completed"
        );
        assert_eq!(
            UpdateOutcome::default().render("a1"),
            "Successfully updated diagram a1"
        );
    }

    #[test]
    fn create_render_falls_back_to_requested_path() {
        let outcome: CreateOutcome = serde_json::from_value(json!({
            "success": true,
            "id": "c3",
            "fileName": "new.drawio.svg",
            "filePath": "/p/docs/new.drawio.svg",
            "fileType": "svg"
        }))
        .unwrap();
        assert_eq!(
            outcome.render("docs/new.drawio.svg"),
            "Successfully created diagram: new.drawio.svg\nID: c3\nFile path: /p/docs/new.drawio.svg\nFile type: svg"
        );

        assert_eq!(
            CreateOutcome::default().render("docs/x.svg"),
            "Successfully created diagram: docs/x.svg"
        );
    }
}
