use quill_core::image::{AvatarDimension, ResizeMode, TransformOptions};
use quill_core::toast::{ActionToast, Notifier, TracingToastSink};
use quill_core::{QuillConfig, SafeHtml, Settings};
use serde::Serialize;
use std::io::Read;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Quill(quill_core::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Quill(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<quill_core::Error> for CliError {
    fn from(value: quill_core::Error) -> Self {
        Self::Quill(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Sanitize,
    Strip,
    Excerpt,
    CountWords,
    Url,
    Image,
    Avatar,
    Toast,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sanitize" => Self::Sanitize,
            "strip" => Self::Strip,
            "excerpt" => Self::Excerpt,
            "count-words" => Self::CountWords,
            "url" => Self::Url,
            "image" => Self::Image,
            "avatar" => Self::Avatar,
            "toast" => Self::Toast,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Profile {
    #[default]
    Strict,
    Minimal,
    LinkSafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExcerptBound {
    Chars(usize),
    Words(usize),
}

#[derive(Debug, Default)]
struct Args {
    command: Option<Command>,
    positional: Vec<String>,
    config: Option<String>,
    json: bool,
    profile: Profile,
    bound: Option<ExcerptBound>,
    policy: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    quality: Option<u8>,
    resize: Option<String>,
    size: Option<String>,
}

fn usage() -> &'static str {
    "quill-cli\n\
\n\
USAGE:\n\
  quill-cli sanitize [--profile strict|minimal|link-safe] [--json] [<path>|-]\n\
  quill-cli strip [<path>|-]\n\
  quill-cli excerpt (--chars <n> | --words <n>) [--json] [<path>|-]\n\
  quill-cli count-words [--json] [<path>|-]\n\
  quill-cli url [--policy denylist|allowlist] [<url>|-]\n\
  quill-cli image [--width <w>] [--height <h>] [--quality <q>] [--resize cover|contain|fill] [<url>|-]\n\
  quill-cli avatar [--size xs|sm|md|lg|xl|2xl|3xl|4xl|<px>] [--json] [<url>|-]\n\
  quill-cli toast <event> [<arg>]\n\
\n\
GLOBAL OPTIONS:\n\
  --config <path>   JSON settings file (sanitize.*, url.policy, images.*)\n\
  --json            structured output where the command supports it\n\
\n\
NOTES:\n\
  - If the input is omitted or '-', it is read from stdin.\n\
  - url, image and avatar take the URL itself; surrounding whitespace is trimmed.\n\
  - Set RUST_LOG (e.g. RUST_LOG=quill_core=debug) to see diagnostics on stderr.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a str, CliError> {
    it.next()
        .map(String::as_str)
        .ok_or(CliError::Usage(usage()))
}

fn next_number<'a, T: std::str::FromStr>(
    it: &mut impl Iterator<Item = &'a String>,
) -> Result<T, CliError> {
    next_value(it)?
        .parse::<T>()
        .map_err(|_| CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--json" => args.json = true,
            "--config" => args.config = Some(next_value(&mut it)?.to_string()),
            "--profile" => {
                args.profile = match next_value(&mut it)? {
                    "strict" => Profile::Strict,
                    "minimal" => Profile::Minimal,
                    "link-safe" => Profile::LinkSafe,
                    _ => return Err(CliError::Usage(usage())),
                };
            }
            "--chars" => {
                if args.bound.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.bound = Some(ExcerptBound::Chars(next_number(&mut it)?));
            }
            "--words" => {
                if args.bound.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.bound = Some(ExcerptBound::Words(next_number(&mut it)?));
            }
            "--policy" => args.policy = Some(next_value(&mut it)?.to_string()),
            "--width" => args.width = Some(next_number(&mut it)?),
            "--height" => args.height = Some(next_number(&mut it)?),
            "--quality" => args.quality = Some(next_number(&mut it)?),
            "--resize" => args.resize = Some(next_value(&mut it)?.to_string()),
            "--size" => args.size = Some(next_value(&mut it)?.to_string()),
            "--" => args.positional.extend(it.by_ref().cloned()),
            "-" => args.positional.push(a.clone()),
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            other => match args.command {
                None => {
                    args.command =
                        Some(Command::from_name(other).ok_or(CliError::Usage(usage()))?);
                }
                Some(_) => args.positional.push(other.to_string()),
            },
        }
    }

    let max_positional = match args.command {
        None => return Err(CliError::Usage(usage())),
        Some(Command::Toast) => 2,
        Some(_) => 1,
    };
    if args.positional.len() > max_positional {
        return Err(CliError::Usage(usage()));
    }
    if args.command == Some(Command::Toast) && args.positional.is_empty() {
        return Err(CliError::Usage(usage()));
    }
    if args.command == Some(Command::Excerpt) && args.bound.is_none() {
        return Err(CliError::Usage(usage()));
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

/// URL commands take the value inline; `-` or nothing reads it from stdin.
fn read_url(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => Ok(read_input(None)?.trim().to_string()),
        Some(url) => Ok(url.trim().to_string()),
    }
}

fn load_config(path: Option<&str>) -> Result<QuillConfig, CliError> {
    let Some(path) = path else {
        return Ok(QuillConfig::defaults());
    };
    let text = std::fs::read_to_string(path)?;
    let user = QuillConfig::from_json_str(&text)?;
    tracing::debug!(path, "loaded config");
    Ok(QuillConfig::with_defaults(&user))
}

fn write_json(value: &impl Serialize) -> Result<(), CliError> {
    serde_json::to_writer(std::io::stdout().lock(), value)?;
    println!();
    Ok(())
}

#[derive(Serialize)]
struct WordCountOut {
    words: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvatarOut {
    src: String,
    src_set: String,
}

fn run(args: Args) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(policy) = &args.policy {
        config.set_value("url.policy", serde_json::Value::String(policy.clone()));
    }
    let settings = Settings::from_config(&config)?;
    let input = args.positional.first().map(String::as_str);

    match args.command.ok_or(CliError::Usage(usage()))? {
        Command::Sanitize => {
            let html = read_input(input)?;
            let profile = match args.profile {
                Profile::Strict | Profile::LinkSafe => &settings.strict,
                Profile::Minimal => &settings.minimal,
            };
            let safe = SafeHtml::with_profile(&html, profile);
            if args.json {
                write_json(&safe)?;
            } else {
                println!("{safe}");
            }
        }
        Command::Strip => {
            println!("{}", quill_core::strip_html(&read_input(input)?));
        }
        Command::Excerpt => {
            let html = read_input(input)?;
            let excerpt = match args.bound {
                Some(ExcerptBound::Chars(n)) => quill_core::excerpt(&html, n),
                Some(ExcerptBound::Words(n)) => quill_core::get_excerpt_by_words(&html, n),
                None => return Err(CliError::Usage(usage())),
            };
            if args.json {
                write_json(&excerpt)?;
            } else {
                println!("{}", excerpt.text);
            }
        }
        Command::CountWords => {
            let words = quill_core::count_words(&read_input(input)?);
            if args.json {
                write_json(&WordCountOut { words })?;
            } else {
                println!("{words}");
            }
        }
        Command::Url => {
            let url = read_url(input)?;
            println!("{}", settings.sanitize_url(&url));
        }
        Command::Image => {
            let url = read_url(input)?;
            let resize = match &args.resize {
                Some(mode) => mode.parse::<ResizeMode>()?,
                None => ResizeMode::default(),
            };
            let options = TransformOptions {
                width: args.width,
                height: args.height,
                quality: args.quality,
                resize,
            };
            println!(
                "{}",
                settings.images.optimized_image_url(Some(&url), &options)
            );
        }
        Command::Avatar => {
            let url = read_url(input)?;
            let url = Some(url.as_str()).filter(|u| !u.is_empty());
            let size = match &args.size {
                Some(size) => size.parse::<AvatarDimension>()?,
                None => AvatarDimension::default(),
            };
            let src = settings.images.avatar_url(url, size);
            if args.json {
                write_json(&AvatarOut {
                    src,
                    src_set: settings.images.avatar_src_set(url, size.pixels()),
                })?;
            } else {
                println!("{src}");
            }
        }
        Command::Toast => {
            let name = args.positional.first().ok_or(CliError::Usage(usage()))?;
            let action = ActionToast::from_name(name, args.positional.get(1).map(String::as_str))?;
            let toast = action.toast();
            Notifier::new(TracingToastSink::default()).show(&toast);
            write_json(&toast)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_tracing();

    match run(args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("quill-cli")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_excerpt_bounds() {
        let args = parse_args(&argv(&["excerpt", "--words", "5", "post.html"])).unwrap();
        assert_eq!(args.command, Some(Command::Excerpt));
        assert_eq!(args.bound, Some(ExcerptBound::Words(5)));
        assert_eq!(args.positional, vec!["post.html".to_string()]);
    }

    #[test]
    fn excerpt_requires_exactly_one_bound() {
        assert!(matches!(
            parse_args(&argv(&["excerpt"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&argv(&["excerpt", "--chars", "3", "--words", "2"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn toast_takes_event_and_optional_argument() {
        let args = parse_args(&argv(&["toast", "copied", "Link"])).unwrap();
        assert_eq!(args.positional, vec!["copied".to_string(), "Link".to_string()]);
        assert!(matches!(
            parse_args(&argv(&["toast"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn config_file_is_merged_over_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quill.json");
        std::fs::write(&path, r#"{ "images": { "defaultQuality": 50 } }"#).unwrap();

        let config = load_config(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(
            config.require_u64("images.defaultQuality").unwrap(),
            Some(50)
        );
        assert_eq!(config.require_u64("images.avatarQuality").unwrap(), Some(80));
        assert_eq!(config.get_str("url.policy"), Some("denylist"));
    }

    #[test]
    fn rejects_unknown_commands_and_flags() {
        assert!(matches!(parse_args(&argv(&["frobnicate"])), Err(CliError::Usage(_))));
        assert!(matches!(
            parse_args(&argv(&["strip", "--bogus"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(parse_args(&argv(&[])), Err(CliError::Usage(_))));
        assert!(matches!(
            parse_args(&argv(&["sanitize", "--profile", "loose"])),
            Err(CliError::Usage(_))
        ));
    }
}
