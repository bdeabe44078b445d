//! Command argument rendering.
//!
//! Placeholders:
//! - `{source}` / `{target}`: step input and output paths.
//! - `{sourceMimetype}` / `{targetMimetype}`: step mimetypes.
//! - `{options}`: an argument consisting only of this token expands to one
//!   `--name=value` argument per option.
//! - `{option:NAME}`: the option's value; the whole argument is dropped when the option
//!   was not supplied.
//!
//! A template that references neither path gets `source target` appended.

use std::path::Path;

use tengine_core::{CommandTemplate, TransformOptions};

const OPTIONS_TOKEN: &str = "{options}";
const OPTION_PREFIX: &str = "{option:";

/// Values substituted into a command template.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Step input path.
    pub source: &'a Path,
    /// Step output path.
    pub target: &'a Path,
    /// Step input mimetype.
    pub source_media_type: &'a str,
    /// Step output mimetype.
    pub target_media_type: &'a str,
    /// Options forwarded to this step.
    pub options: &'a TransformOptions,
}

/// Render the template's arguments for one invocation.
#[must_use]
pub fn render_args(template: &CommandTemplate, ctx: &RenderContext<'_>) -> Vec<String> {
    let source = ctx.source.to_string_lossy();
    let target = ctx.target.to_string_lossy();
    let mut rendered = Vec::with_capacity(template.args.len() + 2);
    let mut references_paths = false;

    for arg in &template.args {
        if arg == OPTIONS_TOKEN {
            rendered.extend(
                ctx.options
                    .iter()
                    .map(|(name, value)| format!("--{name}={value}")),
            );
            continue;
        }
        references_paths |= arg.contains("{source}") || arg.contains("{target}");
        let Some(arg) = substitute_options(arg, ctx.options) else {
            continue;
        };
        rendered.push(
            arg.replace("{sourceMimetype}", ctx.source_media_type)
                .replace("{targetMimetype}", ctx.target_media_type)
                .replace("{source}", &source)
                .replace("{target}", &target),
        );
    }

    if !references_paths {
        rendered.push(source.into_owned());
        rendered.push(target.into_owned());
    }
    rendered
}

fn substitute_options(arg: &str, options: &TransformOptions) -> Option<String> {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(start) = rest.find(OPTION_PREFIX) {
        let after = &rest[start + OPTION_PREFIX.len()..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        let value = options.get(name)?;
        out.push_str(&rest[..start]);
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn template(args: &[&str]) -> CommandTemplate {
        CommandTemplate {
            program: "convert".into(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
        }
    }

    fn render(args: &[&str], options: &TransformOptions) -> Vec<String> {
        let source = PathBuf::from("/work/source_1.pdf");
        let target = PathBuf::from("/work/target_1.png");
        let ctx = RenderContext {
            source: &source,
            target: &target,
            source_media_type: "application/pdf",
            target_media_type: "image/png",
            options,
        };
        render_args(&template(args), &ctx)
    }

    #[test]
    fn paths_and_mimetypes_are_substituted_positionally() {
        let args = render(
            &["--from={sourceMimetype}", "{source}", "{target}"],
            &TransformOptions::new(),
        );
        assert_eq!(
            args,
            vec![
                "--from=application/pdf",
                "/work/source_1.pdf",
                "/work/target_1.png"
            ]
        );
    }

    #[test]
    fn options_expand_and_optional_args_drop() {
        let mut options = TransformOptions::new();
        options.insert("resizeWidth".into(), "100".into());
        options.insert("page".into(), "2".into());

        let args = render(
            &[
                "{options}",
                "-w{option:resizeWidth}",
                "--q={option:quality}",
                "{source}",
                "{target}",
            ],
            &options,
        );
        assert_eq!(
            args,
            vec![
                "--page=2",
                "--resizeWidth=100",
                "-w100",
                "/work/source_1.pdf",
                "/work/target_1.png",
            ]
        );
    }

    #[test]
    fn missing_path_placeholders_are_appended() {
        let args = render(&["-quiet"], &TransformOptions::new());
        assert_eq!(
            args,
            vec!["-quiet", "/work/source_1.pdf", "/work/target_1.png"]
        );
    }
}
