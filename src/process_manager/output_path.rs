// Output path derivation for worker jobs
use crate::models::{JobRequest, Operation};

const DEFAULT_MODEL_TOKEN: &str = "model";
const DEFAULT_EXTENSION: &str = "png";

/// Replaces every character outside `[A-Za-z0-9-_]` with `_`
pub fn sanitize_model_name(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Drops the final `.ext` of the last path component, if there is one
fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot)
            if dot + 1 < path.len() && !path[dot + 1..].contains(['/', '\\']) =>
        {
            &path[..dot]
        }
        _ => path,
    }
}

fn suffix_for(operation: &Operation, model: Option<&str>) -> String {
    match operation {
        Operation::Upscale => format!(
            "_{}_upscaled",
            sanitize_model_name(model.unwrap_or(DEFAULT_MODEL_TOKEN))
        ),
        Operation::RemoveBackground => "_removed_bg".to_string(),
        Operation::Convert => "_converted".to_string(),
        Operation::Other(_) => "_processed".to_string(),
    }
}

/// Destination beside the input: `<base><suffix>.<ext>`.
///
/// Pure string transform; the filesystem is never consulted.
pub fn resolve_output_path(
    input_path: &str,
    operation: &Operation,
    model: Option<&str>,
    format: Option<&str>,
) -> String {
    let model = model.filter(|m| !m.is_empty());
    let extension = match (operation, format.filter(|f| !f.is_empty())) {
        (Operation::Convert, Some(format)) => format,
        _ => DEFAULT_EXTENSION,
    };

    format!(
        "{}{}.{}",
        strip_extension(input_path),
        suffix_for(operation, model),
        extension
    )
}

pub fn output_path_for(request: &JobRequest) -> String {
    resolve_output_path(
        &request.input_path,
        &request.operation,
        request.model.as_deref(),
        request.format.as_deref(),
    )
}
