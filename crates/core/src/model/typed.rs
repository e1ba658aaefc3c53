//! Dictionary and stream subtype dispatch.
//!
//! Completed dictionaries and captured streams are classified once at
//! parse time so downstream consumers can dispatch without re-inspecting
//! `/Type` and `/Subtype` entries.

use super::objects::Dictionary;

/// Dictionary subtype derived from `/Type` (lowercase `/type` accepted
/// as a recovery for malformed producers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Catalog,
    PageTree,
    Page,
    Font,
    FontDescriptor,
    CMap,
    Annotation,
    OptionalContentGroup,
    OptionalContentMembership,
    Other,
}

impl ObjectKind {
    pub fn classify(dict: &Dictionary) -> Self {
        let Some(type_name) = dict
            .get_any(&["Type", "type"])
            .and_then(|o| o.as_name().ok())
        else {
            return Self::Other;
        };
        match type_name.as_str() {
            "Catalog" => Self::Catalog,
            "Pages" => Self::PageTree,
            "Page" => Self::Page,
            // Some producers tag font descriptors /Type /Font; the
            // embedded-font-file keys tell them apart.
            "Font" => {
                if dict
                    .get_any(&["FontFile", "FontFile2", "FontFile3"])
                    .is_some()
                {
                    Self::FontDescriptor
                } else {
                    Self::Font
                }
            }
            "FontDescriptor" => Self::FontDescriptor,
            "CMap" => Self::CMap,
            "Annot" => Self::Annotation,
            "OCG" => Self::OptionalContentGroup,
            "OCMD" => Self::OptionalContentMembership,
            _ => Self::Other,
        }
    }
}

/// Stream subtype derived from `/Type`, `/Subtype`, and `/PatternType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Cross-reference stream: decoded and ingested at parse time.
    XRef,
    /// Compressed object container.
    ObjectStream,
    Image,
    Form,
    TilingPattern,
    Other,
}

impl StreamKind {
    pub fn classify(dict: &Dictionary) -> Self {
        if let Some(type_name) = dict
            .get_any(&["Type", "type"])
            .and_then(|o| o.as_name().ok())
        {
            match type_name.as_str() {
                "XRef" => return Self::XRef,
                "ObjStm" => return Self::ObjectStream,
                "Pattern" => return Self::TilingPattern,
                _ => {}
            }
        }
        if let Some(subtype) = dict.get("Subtype").and_then(|o| o.as_name().ok()) {
            match subtype.as_str() {
                "Image" => return Self::Image,
                "Form" => return Self::Form,
                _ => {}
            }
        }
        match dict.get("PatternType").and_then(|o| o.as_int().ok()) {
            Some(1) => Self::TilingPattern,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::{Name, Object};

    fn dict_with_type(t: &str) -> Dictionary {
        let mut d = Dictionary::new();
        d.insert("Type", Object::Name(Name::new(t)));
        d
    }

    #[test]
    fn test_classify_common_types() {
        assert_eq!(
            ObjectKind::classify(&dict_with_type("Catalog")),
            ObjectKind::Catalog
        );
        assert_eq!(
            ObjectKind::classify(&dict_with_type("Pages")),
            ObjectKind::PageTree
        );
        assert_eq!(
            ObjectKind::classify(&dict_with_type("Page")),
            ObjectKind::Page
        );
        assert_eq!(
            ObjectKind::classify(&dict_with_type("Annot")),
            ObjectKind::Annotation
        );
        assert_eq!(
            ObjectKind::classify(&dict_with_type("OCG")),
            ObjectKind::OptionalContentGroup
        );
        assert_eq!(
            ObjectKind::classify(&Dictionary::new()),
            ObjectKind::Other
        );
    }

    #[test]
    fn test_lowercase_type_recovery() {
        let mut d = Dictionary::new();
        d.insert("type", Object::Name(Name::new("Page")));
        assert_eq!(ObjectKind::classify(&d), ObjectKind::Page);
    }

    #[test]
    fn test_font_with_font_file_is_descriptor() {
        let mut d = dict_with_type("Font");
        assert_eq!(ObjectKind::classify(&d), ObjectKind::Font);
        d.insert("FontFile2", Object::Reference(crate::model::Reference::new(9, 0)));
        assert_eq!(ObjectKind::classify(&d), ObjectKind::FontDescriptor);
    }

    #[test]
    fn test_stream_kinds() {
        assert_eq!(
            StreamKind::classify(&dict_with_type("XRef")),
            StreamKind::XRef
        );
        assert_eq!(
            StreamKind::classify(&dict_with_type("ObjStm")),
            StreamKind::ObjectStream
        );

        let mut d = Dictionary::new();
        d.insert("Subtype", Object::Name(Name::new("Image")));
        assert_eq!(StreamKind::classify(&d), StreamKind::Image);

        let mut d = Dictionary::new();
        d.insert("PatternType", Object::Integer(1));
        assert_eq!(StreamKind::classify(&d), StreamKind::TilingPattern);
        assert_eq!(StreamKind::classify(&Dictionary::new()), StreamKind::Other);
    }
}
