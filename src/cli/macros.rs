//! Flag macros
//!
//! A `+name` token stands for a fixed bundle of short flags and is
//! rewritten before clap sees the argument list.

use crate::error::{AppError, AppResult};

/// Macro name (without `+`) and its expansion
pub const MACROS: &[(&str, &str)] = &[
    ("production", "-kcrp"),
    ("debug", "-kcrd"),
    ("update-assets", "-nu"),
    ("refresh-assets", "-kcr"),
    ("prepare-release", "-kc"),
];

pub const MACRO_HELP: &str = "\
Macros:
  +production       same as -kcrp
  +debug            same as -kcrd
  +update-assets    same as -nu
  +refresh-assets   same as -kcr
  +prepare-release  same as -kc";

/// Replace `+macro` tokens in place
///
/// The first token (program name) and everything after `--` are left alone.
pub fn expand_macros<I, S>(args: I) -> AppResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut expanded = Vec::new();
    let mut literal = false;

    for (index, token) in args.into_iter().map(Into::into).enumerate() {
        if index == 0 || literal {
            expanded.push(token);
            continue;
        }
        if token == "--" {
            literal = true;
            expanded.push(token);
            continue;
        }

        match token.strip_prefix('+') {
            Some(name) => {
                let (_, flags) = MACROS
                    .iter()
                    .find(|(macro_name, _)| *macro_name == name)
                    .ok_or_else(|| AppError::usage(format!("unknown macro '{}'", token)))?;
                expanded.push(flags.to_string());
            }
            None => expanded.push(token),
        }
    }

    Ok(expanded)
}
