use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::activation::{ActivationConfig, AnimationStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
}

#[derive(Debug, Clone)]
pub struct LayoutError {
    pub code: LayoutErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

/// One `<ActivatableDef>` placed in the world, with where it was declared.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivatableDef {
    pub config: ActivationConfig,
    pub file_path: PathBuf,
    pub index_in_file: usize,
    pub location: Option<SourceLocation>,
}

/// Loads every `.xml` file under `dir` (recursively, sorted by relative path).
pub fn load_layout_dir(dir: &Path) -> Result<Vec<ActivatableDef>, LayoutError> {
    let mut files = Vec::<PathBuf>::new();
    collect_xml_files(dir, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(dir).unwrap_or(path)));

    let mut defs = Vec::new();
    for file in files {
        defs.extend(load_layout_file(&file)?);
    }
    Ok(defs)
}

pub fn load_layout_file(path: &Path) -> Result<Vec<ActivatableDef>, LayoutError> {
    let raw = fs::read_to_string(path).map_err(|source| LayoutError {
        code: LayoutErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    })?;
    parse_layout_document(path, &raw)
}

pub fn parse_layout_document(
    file_path: &Path,
    raw: &str,
) -> Result<Vec<ActivatableDef>, LayoutError> {
    let doc = Document::parse(raw).map_err(|error| LayoutError {
        code: LayoutErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            LayoutErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut defs = Vec::new();
    for (index, child) in root
        .children()
        .filter(|node| node.is_element())
        .enumerate()
    {
        if child.tag_name().name() != "ActivatableDef" {
            return Err(error_at_node(
                LayoutErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; expected <ActivatableDef>",
                    child.tag_name().name()
                ),
                file_path,
                &doc,
                child,
            ));
        }
        let config = parse_activatable_def(file_path, &doc, child)?;
        let pos = doc.text_pos_at(child.range().start);
        defs.push(ActivatableDef {
            config,
            file_path: file_path.to_path_buf(),
            index_in_file: index,
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        });
    }

    Ok(defs)
}

fn parse_activatable_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ActivationConfig, LayoutError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut config = ActivationConfig::default();
    let mut label: Option<String> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                LayoutErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <ActivatableDef>"),
                file_path,
                doc,
                field,
            ));
        }

        match field_name.as_str() {
            // May be empty; id_audit reports those.
            "id" => config.id = optional_text(field),
            "label" => label = Some(required_text(file_path, doc, field, "label")?),
            "targetZone" => {
                let zone = optional_text(field);
                config.target_zone = (!zone.is_empty()).then_some(zone);
            }
            "requiredVisits" => {
                let value = required_text(file_path, doc, field, "requiredVisits")?;
                config.required_visits = match value.parse::<u32>() {
                    Ok(parsed) if parsed >= 1 => parsed,
                    _ => {
                        return Err(error_at_node(
                            LayoutErrorCode::InvalidValue,
                            format!("requiredVisits '{value}' must be an integer >= 1"),
                            file_path,
                            doc,
                            field,
                        ))
                    }
                };
            }
            "animation" => {
                let value = required_text(file_path, doc, field, "animation")?;
                config.style = AnimationStyle::parse(&value).ok_or_else(|| {
                    error_at_node(
                        LayoutErrorCode::InvalidValue,
                        format!(
                            "invalid animation '{value}'; allowed values: Instant, FadeIn, ScaleUp, FadeAndScale"
                        ),
                        file_path,
                        doc,
                        field,
                    )
                })?;
            }
            "durationSeconds" => {
                let value = required_text(file_path, doc, field, "durationSeconds")?;
                config.duration_seconds = match value.parse::<f32>() {
                    Ok(parsed) if parsed.is_finite() && parsed > 0.0 => parsed,
                    _ => {
                        return Err(error_at_node(
                            LayoutErrorCode::InvalidValue,
                            format!("durationSeconds '{value}' must be finite and > 0"),
                            file_path,
                            doc,
                            field,
                        ))
                    }
                };
            }
            "permanent" => {
                let value = required_text(file_path, doc, field, "permanent")?;
                config.permanent = match value.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(error_at_node(
                            LayoutErrorCode::InvalidValue,
                            format!("permanent '{value}' must be true or false"),
                            file_path,
                            doc,
                            field,
                        ))
                    }
                };
            }
            _ => {
                return Err(error_at_node(
                    LayoutErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <ActivatableDef>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let Some(label) = label else {
        return Err(error_at_node(
            LayoutErrorCode::MissingField,
            "missing required field <label> in <ActivatableDef>".to_string(),
            file_path,
            doc,
            node,
        ));
    };
    config.label = label;
    Ok(config)
}

fn optional_text(node: Node<'_, '_>) -> String {
    node.text().map(str::trim).unwrap_or_default().to_string()
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, LayoutError> {
    let value = optional_text(node);
    if value.is_empty() {
        return Err(error_at_node(
            LayoutErrorCode::MissingField,
            format!("field <{field_name}> must not be empty"),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn error_at_node(
    code: LayoutErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> LayoutError {
    let pos = doc.text_pos_at(node.range().start);
    LayoutError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

fn collect_xml_files(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), LayoutError> {
    let read_dir_error = |source: std::io::Error| LayoutError {
        code: LayoutErrorCode::ReadFile,
        message: format!("failed to read layout directory: {source}"),
        file_path: current.to_path_buf(),
        location: None,
    };
    for entry in fs::read_dir(current).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_dir() {
            collect_xml_files(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn parse(raw: &str) -> Result<Vec<ActivatableDef>, LayoutError> {
        parse_layout_document(Path::new("world.xml"), raw)
    }

    #[test]
    fn parses_full_def() {
        let defs = parse(
            r#"<Defs>
  <ActivatableDef>
    <id>homestead_01</id>
    <label>Homestead</label>
    <targetZone>zone_01</targetZone>
    <requiredVisits>2</requiredVisits>
    <animation>FadeAndScale</animation>
    <durationSeconds>1.5</durationSeconds>
    <permanent>false</permanent>
  </ActivatableDef>
</Defs>"#,
        )
        .expect("parse");

        assert_eq!(defs.len(), 1);
        let config = &defs[0].config;
        assert_eq!(config.id, "homestead_01");
        assert_eq!(config.label, "Homestead");
        assert_eq!(config.target_zone.as_deref(), Some("zone_01"));
        assert_eq!(config.required_visits, 2);
        assert_eq!(config.style, AnimationStyle::FadeAndScale);
        assert_eq!(config.duration_seconds, 1.5);
        assert!(!config.permanent);
        assert_eq!(defs[0].location.map(|loc| loc.line), Some(2));
    }

    #[test]
    fn optional_fields_take_defaults() {
        let defs = parse("<Defs><ActivatableDef><label>Shed</label></ActivatableDef></Defs>")
            .expect("parse");
        let config = &defs[0].config;
        assert!(config.id.is_empty());
        assert_eq!(config.target_zone, None);
        assert_eq!(config.required_visits, 1);
        assert_eq!(config.style, AnimationStyle::FadeIn);
        assert!(config.permanent);
    }

    #[test]
    fn rejects_unknown_animation_with_location() {
        let error = parse(
            "<Defs>\n<ActivatableDef>\n<label>Shed</label>\n<animation>Spin</animation>\n</ActivatableDef>\n</Defs>",
        )
        .expect_err("invalid animation");
        assert_eq!(error.code, LayoutErrorCode::InvalidValue);
        assert_eq!(error.location.map(|loc| loc.line), Some(4));
    }

    #[test]
    fn rejects_zero_required_visits() {
        let error = parse(
            "<Defs><ActivatableDef><label>Shed</label><requiredVisits>0</requiredVisits></ActivatableDef></Defs>",
        )
        .expect_err("zero visits");
        assert_eq!(error.code, LayoutErrorCode::InvalidValue);
    }

    #[test]
    fn rejects_wrong_root_and_duplicate_fields() {
        assert_eq!(
            parse("<World/>").expect_err("root").code,
            LayoutErrorCode::InvalidRoot
        );
        assert_eq!(
            parse("<Defs><ActivatableDef><label>A</label><label>B</label></ActivatableDef></Defs>")
                .expect_err("dup")
                .code,
            LayoutErrorCode::DuplicateField
        );
        assert_eq!(
            parse("<Defs><ActivatableDef><id>x</id></ActivatableDef></Defs>")
                .expect_err("label")
                .code,
            LayoutErrorCode::MissingField
        );
    }

    #[test]
    fn directory_load_is_sorted_by_relative_path() {
        let temp = TempDir::new().expect("tempdir");
        let nested = temp.path().join("b_region");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(
            nested.join("tower.xml"),
            "<Defs><ActivatableDef><id>tower</id><label>Tower</label></ActivatableDef></Defs>",
        )
        .expect("write");
        fs::write(
            temp.path().join("a_shed.xml"),
            "<Defs><ActivatableDef><id>shed</id><label>Shed</label></ActivatableDef></Defs>",
        )
        .expect("write");
        fs::write(temp.path().join("notes.txt"), "ignored").expect("write");

        let defs = load_layout_dir(temp.path()).expect("load");
        let ids = defs
            .iter()
            .map(|def| def.config.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["shed", "tower"]);
    }

    #[test]
    fn bundled_world_layout_is_valid_and_audits_clean() {
        let raw = include_str!("../../../assets/base/world.xml");
        let defs = parse_layout_document(Path::new("world.xml"), raw).expect("bundled layout");

        assert_eq!(defs.len(), 6);
        assert!(crate::integrity::audit(&defs).is_clean());
        assert!(defs
            .iter()
            .all(|def| def.config.target_zone.is_some()));
    }
}
