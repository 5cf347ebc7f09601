//! Shader files are saved as plain text with a small comment header
//! recording the source path of every texture binding, one line per
//! binding in slot order. The header is stripped again on open, so the
//! editor only ever sees the shader body.

use std::path::PathBuf;

const TEXTURE_PREFIX: &str = "//!texture ";

/// Prepends the binding header to a shader body for saving.
pub fn compose(frag: &str, texture_paths: &[&PathBuf]) -> String {
    let mut out = String::new();

    for path in texture_paths {
        out.push_str(TEXTURE_PREFIX);
        out.push_str(&path.display().to_string());
        out.push('\n');
    }

    out.push_str(frag);
    out
}

/// Splits a loaded shader file into its body and the texture paths
/// declared in the header. Unknown leading lines belong to the body.
pub fn parse(contents: &str) -> (String, Vec<PathBuf>) {
    let mut paths = vec![];
    let mut body_start = 0;

    for line in contents.lines() {
        match line.strip_prefix(TEXTURE_PREFIX) {
            Some(path) if !path.trim().is_empty() => {
                paths.push(PathBuf::from(path.trim()));
                // +1 for the newline; saturates on a header-only file.
                body_start = (body_start + line.len() + 1).min(contents.len());
            }
            _ => break,
        }
    }

    (contents[body_start..].to_string(), paths)
}

#[cfg(test)]
mod tests {
    use super::{compose, parse};
    use std::path::PathBuf;

    #[test]
    fn round_trips_texture_paths_in_order() {
        let first = PathBuf::from("textures/noise.png");
        let second = PathBuf::from("textures/stones.jpg");
        let frag = "@fragment\nfn main() {}\n";

        let saved = compose(frag, &[&first, &second]);
        let (body, paths) = parse(&saved);

        assert_eq!(body, frag);
        assert_eq!(paths, vec![first, second]);
    }

    #[test]
    fn plain_shader_has_no_bindings() {
        let frag = "// a comment, not a binding\nfn main() {}";
        let (body, paths) = parse(frag);

        assert_eq!(body, frag);
        assert!(paths.is_empty());
    }

    #[test]
    fn header_only_file_parses_to_empty_body() {
        let (body, paths) = parse("//!texture a.png");

        assert!(body.is_empty());
        assert_eq!(paths, vec![PathBuf::from("a.png")]);
    }
}
