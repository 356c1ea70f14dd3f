use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::calendar::{
  MonthBounds,
  YearMonth
};

const RC_ENV_VAR: &str = "SEASONROOMRC";
const RC_FILE_NAME: &str = ".seasonroomrc";

pub const KEY_BASE_URL: &str =
  "api.base_url";
pub const KEY_TIMEOUT_SECS: &str =
  "api.timeout_secs";
pub const KEY_DATA_LOCATION: &str =
  "data.location";
pub const KEY_SEASON_START: &str =
  "season.start";
pub const KEY_SEASON_END: &str =
  "season.end";
pub const KEY_COLOR: &str = "color";

const DEFAULTS: &[(&str, &str)] = &[
  (
    KEY_BASE_URL,
    "http://localhost:8080/api"
  ),
  (KEY_TIMEOUT_SECS, "15"),
  (KEY_DATA_LOCATION, "~/.seasonroom"),
  (KEY_SEASON_START, "2025-10"),
  (KEY_SEASON_END, "2026-05"),
  (KEY_COLOR, "on")
];

#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// `Ok(None)` when unset; an error
  /// when set to something that is
  /// not a recognizable flag.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "invalid {key} setting: {raw}"
        )
      }
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn base_url(
    &self
  ) -> anyhow::Result<String> {
    let raw = self
      .get(KEY_BASE_URL)
      .ok_or_else(|| {
        anyhow!(
          "{KEY_BASE_URL} is not set"
        )
      })?;
    let trimmed =
      raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
      return Err(anyhow!(
        "{KEY_BASE_URL} is empty"
      ));
    }
    Ok(trimmed.to_string())
  }

  pub fn request_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let raw = self
      .get(KEY_TIMEOUT_SECS)
      .unwrap_or_else(|| "15".to_string());
    let secs: u64 =
      raw.trim().parse().with_context(
        || {
          format!(
            "invalid \
             {KEY_TIMEOUT_SECS}: {raw}"
          )
        }
      )?;
    if secs == 0 {
      return Err(anyhow!(
        "{KEY_TIMEOUT_SECS} must be \
         positive"
      ));
    }
    Ok(Duration::from_secs(secs))
  }

  pub fn season_bounds(
    &self
  ) -> anyhow::Result<MonthBounds> {
    let start: YearMonth = self
      .get(KEY_SEASON_START)
      .ok_or_else(|| {
        anyhow!(
          "{KEY_SEASON_START} is not \
           set"
        )
      })?
      .parse()
      .context(KEY_SEASON_START)?;
    let end: YearMonth = self
      .get(KEY_SEASON_END)
      .ok_or_else(|| {
        anyhow!(
          "{KEY_SEASON_END} is not set"
        )
      })?
      .parse()
      .context(KEY_SEASON_END)?;
    MonthBounds::new(start, end)
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "cannot read rc file {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for (idx, raw) in
      text.lines().enumerate()
    {
      let entry = parse_rc_line(raw)
        .with_context(|| {
          format!(
            "{}:{}",
            path.display(),
            idx + 1
          )
        })?;
      match entry {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let target =
            resolve_include_path(
              &base_dir, &target
            )?;
          if target.exists() {
            debug!(include = %target.display(), "following include");
            self.load_file(&target)?;
          } else {
            warn!(include = %target.display(), "missing include; skipped");
          }
        }
        | RcLine::Setting(key, value) => {
          trace!(key = %key, value = %value, "rc setting");
          self.map.insert(key, value);
        }
      }
    }

    Ok(())
  }
}

/// One meaningful line of an rc
/// file.
#[derive(Debug, PartialEq, Eq)]
enum RcLine {
  Blank,
  Include(String),
  Setting(String, String)
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<RcLine> {
  let content = raw
    .split_once('#')
    .map_or(raw, |(head, _)| head)
    .trim();
  if content.is_empty() {
    return Ok(RcLine::Blank);
  }
  if let Some(target) =
    content.strip_prefix("include ")
  {
    return Ok(RcLine::Include(
      target.trim().to_string()
    ));
  }
  match content.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(RcLine::Setting(
        key.trim().to_string(),
        value.trim().to_string()
      ))
    }
    | _ => Err(anyhow!(
      "expected `key = value`, got \
       `{}`",
      raw.trim()
    ))
  }
}

/// Directory holding persisted session
/// state; created if missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get(KEY_DATA_LOCATION)
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc lookup"
    );
    return Ok(None);
  };
  let candidate =
    home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".seasonroom"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::{
    Config,
    KEY_BASE_URL,
    RcLine,
    parse_rc_line
  };

  #[test]
  fn defaults_are_usable() {
    let cfg = Config::default();
    assert_eq!(
      cfg.base_url().expect("base url"),
      "http://localhost:8080/api"
    );
    assert_eq!(
      cfg
        .request_timeout()
        .expect("timeout"),
      Duration::from_secs(15)
    );
    let bounds = cfg
      .season_bounds()
      .expect("season");
    assert_eq!(
      bounds.start.to_string(),
      "2025-10"
    );
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("flag"),
      Some(true)
    );
    assert_eq!(
      cfg
        .get_bool("no.such.key")
        .expect("unset"),
      None
    );
  }

  #[test]
  fn loads_file_with_include_and_overrides()
  {
    let dir =
      tempdir().expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "api.timeout_secs = 3\n"
    )
    .expect("write include");
    let rc = dir.path().join("main.rc");
    fs::write(
      &rc,
      "# crew backend\napi.base_url = \
       https://rooms.example.com/api/ \
       # trailing slash\ninclude \
       extra.rc\nseason.end = 2026-04\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(&rc))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.base_url().expect("base url"),
      "https://rooms.example.com/api"
    );
    assert_eq!(
      cfg
        .request_timeout()
        .expect("timeout"),
      Duration::from_secs(3)
    );

    cfg.apply_overrides(vec![(
      format!("rc.{KEY_BASE_URL}"),
      "http://127.0.0.1:9/api"
        .to_string()
    )]);
    assert_eq!(
      cfg.base_url().expect("base url"),
      "http://127.0.0.1:9/api"
    );
  }

  #[test]
  fn rejects_malformed_lines() {
    let dir =
      tempdir().expect("tempdir");
    let rc = dir.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(
      Config::load(Some(&rc)).is_err()
    );
  }

  #[test]
  fn flags_reject_unknown_words() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "color".to_string(),
      "Off".to_string()
    )]);
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("flag"),
      Some(false)
    );
    cfg.apply_overrides(vec![(
      "color".to_string(),
      "sometimes".to_string()
    )]);
    assert!(
      cfg.get_bool("color").is_err()
    );
  }

  #[test]
  fn rejects_inverted_season() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "season.end".to_string(),
      "2025-01".to_string()
    )]);
    assert!(cfg.season_bounds().is_err());
  }

  #[test]
  fn rc_lines_strip_comments() {
    assert_eq!(
      parse_rc_line("  # note")
        .expect("comment"),
      RcLine::Blank
    );
    assert_eq!(
      parse_rc_line(
        "color = off # plain"
      )
      .expect("setting"),
      RcLine::Setting(
        "color".to_string(),
        "off".to_string()
      )
    );
    assert_eq!(
      parse_rc_line("include ~/x.rc")
        .expect("include"),
      RcLine::Include(
        "~/x.rc".to_string()
      )
    );
    assert!(
      parse_rc_line("= dangling")
        .is_err()
    );
  }
}
