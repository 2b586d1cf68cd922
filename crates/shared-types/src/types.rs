/// A named data field extracted from a form by the upstream schema pass.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
}

impl Field {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Date,
    Email,
    Phone,
    Checkbox,
    Select,
    Signature,
    #[serde(other)]
    Other,
}

/// Ordered field list; order matters to the native-field matcher.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Human-facing name for a field id: its label when non-empty, else the id.
    pub fn label_for<'a>(&'a self, id: &'a str) -> &'a str {
        match self.field(id) {
            Some(field) if !field.label.trim().is_empty() => field.label.as_str(),
            _ => id,
        }
    }
}

/// What kind of bytes the caller handed us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Image,
}

impl SourceFormat {
    /// Map a MIME content type; unknown types are assumed to be PDF.
    pub fn from_content_type(content_type: &str) -> Self {
        let lower = content_type.trim().to_ascii_lowercase();
        if lower.starts_with("image/") {
            SourceFormat::Image
        } else {
            SourceFormat::Pdf
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_deserializes_type_key() {
        let json = r#"{"fields":[{"id":"f1","label":"Full Name","type":"text"},{"id":"f2","type":"radio"}]}"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].kind, FieldKind::Text);
        assert_eq!(schema.fields[1].kind, FieldKind::Other);
        assert_eq!(schema.fields[1].label, "");
    }

    #[test]
    fn test_label_for_falls_back_to_id() {
        let schema = Schema::new(vec![
            Field::new("name", "Full Name", FieldKind::Text),
            Field::new("blank", "  ", FieldKind::Text),
        ]);
        assert_eq!(schema.label_for("name"), "Full Name");
        assert_eq!(schema.label_for("blank"), "blank");
        assert_eq!(schema.label_for("missing"), "missing");
    }

    #[test]
    fn test_source_format_from_content_type() {
        assert_eq!(SourceFormat::from_content_type("application/pdf"), SourceFormat::Pdf);
        assert_eq!(SourceFormat::from_content_type("image/png"), SourceFormat::Image);
        assert_eq!(SourceFormat::from_content_type("IMAGE/JPEG"), SourceFormat::Image);
        assert_eq!(SourceFormat::from_content_type("application/octet-stream"), SourceFormat::Pdf);
    }
}
