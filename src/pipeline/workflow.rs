//! # Workflows
//!
//! The orchestrator picks exactly one workflow per request and runs its fixed
//! step list once. There is no open-ended tool selection.
//!
//! | Workflow | When | Steps |
//! |----------|------|-------|
//! | A `Chat` | text tagged Simple | reply |
//! | B `PrintByName` | `print <name>` naming an existing image | adapt, print |
//! | C `Analyze` | an image, or text tagged Medium/Complex | caption, interpret, synthesize, adapt, print |

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use super::classifier::ClassificationTag;

/// Image extensions the images root is searched for.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Message prefix that asks for a stored image by name.
const PRINT_TRIGGER: &str = "print ";

/// One step of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Reply,
    Caption,
    Interpret,
    Synthesize,
    Adapt,
    Print,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    Chat,
    PrintByName(PathBuf),
    Analyze,
}

impl Workflow {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::PrintByName(_) => "print_by_name",
            Self::Analyze => "analyze",
        }
    }

    pub fn steps(&self) -> &'static [Step] {
        match self {
            Self::Chat => &[Step::Reply],
            Self::PrintByName(_) => &[Step::Adapt, Step::Print],
            Self::Analyze => &[
                Step::Caption,
                Step::Interpret,
                Step::Synthesize,
                Step::Adapt,
                Step::Print,
            ],
        }
    }

    /// Deterministic selection from what the request carries.
    pub fn select(tag: ClassificationTag, has_image: bool, text: Option<&str>, images_dir: &Path) -> Self {
        if has_image {
            return Self::Analyze;
        }
        if let Some(path) = text.and_then(|t| print_request(t, images_dir)) {
            return Self::PrintByName(path);
        }
        match tag {
            ClassificationTag::Simple => Self::Chat,
            ClassificationTag::Medium | ClassificationTag::Complex => Self::Analyze,
        }
    }
}

impl Serialize for Workflow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// `print <name>` where the name resolves to a stored image.
fn print_request(text: &str, images_dir: &Path) -> Option<PathBuf> {
    let head = text.get(..PRINT_TRIGGER.len())?;
    if !head.eq_ignore_ascii_case(PRINT_TRIGGER) {
        return None;
    }
    resolve_label_name(images_dir, &text[PRINT_TRIGGER.len()..])
}

/// Resolve a label name to a file directly inside `images_dir`.
///
/// Tries the name as a file name first, then its lowercase words joined by
/// `_` with each known extension: `hello world` finds `hello_world.png`.
pub fn resolve_label_name(images_dir: &Path, name: &str) -> Option<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // never leave the images root
    let exact = Path::new(name).file_name().map(|f| images_dir.join(f));
    if let Some(path) = exact.filter(|p| p.is_file()) {
        return Some(path);
    }

    let slug = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    if slug.contains(['/', '\\']) || slug.starts_with('.') {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| images_dir.join(format!("{}.{}", slug, ext)))
        .find(|p| p.is_file())
}

/// File names of the stored images, sorted.
pub fn list_available_images(images_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(images_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            fs::write(dir.path().join(f), b"x").unwrap();
        }
        dir
    }

    #[test]
    fn test_steps_are_fixed() {
        assert_eq!(Workflow::Chat.steps(), &[Step::Reply]);
        assert_eq!(Workflow::Analyze.steps().len(), 5);
        assert_eq!(Workflow::Analyze.steps().last(), Some(&Step::Print));
    }

    #[test]
    fn test_select_by_tag_and_image() {
        let tmp = images_dir(&[]);
        let dir = tmp.path();
        assert_eq!(Workflow::select(ClassificationTag::Simple, false, Some("hello"), dir), Workflow::Chat);
        assert_eq!(Workflow::select(ClassificationTag::Medium, false, Some("a mug"), dir), Workflow::Analyze);
        assert_eq!(Workflow::select(ClassificationTag::Simple, true, None, dir), Workflow::Analyze);
    }

    #[test]
    fn test_print_by_name() {
        let tmp = images_dir(&["hello_world.png", "Logo.JPG"]);
        let dir = tmp.path();
        assert_eq!(
            Workflow::select(ClassificationTag::Simple, false, Some("print hello world"), dir),
            Workflow::PrintByName(dir.join("hello_world.png"))
        );
        assert_eq!(
            Workflow::select(ClassificationTag::Simple, false, Some("Print Logo.JPG"), dir),
            Workflow::PrintByName(dir.join("Logo.JPG"))
        );
        // unknown name falls through to tag selection
        assert_eq!(
            Workflow::select(ClassificationTag::Simple, false, Some("print a castle"), dir),
            Workflow::Chat
        );
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let tmp = images_dir(&["cat.png"]);
        let dir = tmp.path();
        assert_eq!(resolve_label_name(dir, "../../etc/cat.png"), Some(dir.join("cat.png")));
        assert_eq!(resolve_label_name(dir, "../passwd"), None);
        assert_eq!(resolve_label_name(dir, "  "), None);
    }

    #[test]
    fn test_list_available_images() {
        let tmp = images_dir(&["b.png", "a.jpeg", "notes.txt", "c.BMP"]);
        let dir = tmp.path();
        assert_eq!(list_available_images(dir), vec!["a.jpeg", "b.png", "c.BMP"]);
        assert!(list_available_images(Path::new("/nonexistent/labelbot")).is_empty());
    }
}
