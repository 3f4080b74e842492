//! Linux implementation of the host field sources.
//!
//! Everything is read from procfs, sysfs and `/etc`. All paths are resolved
//! against a configurable root so the readers can be exercised against a
//! fake filesystem tree.

use crate::host::env;
use crate::host::types::{
    BatteryState, CapabilityProbe, DisplayGeometry, FieldError, HostInfo, PowerState,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reads device state from the running Linux system.
#[derive(Debug, Clone)]
pub struct LinuxHost {
    root: PathBuf,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Resolve every system path against `root` instead of `/`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    /// `/etc/timezone` when it names a valid zone, else the `/etc/localtime` link.
    fn time_zone_from_files(&self) -> Result<String, FieldError> {
        if let Ok(name) = self.read_trimmed("etc/timezone") {
            match env::validate_time_zone(&name) {
                Ok(tz) => return Ok(tz),
                Err(e) => tracing::debug!(error = %e, "ignoring /etc/timezone"),
            }
        }
        let target = fs::read_link(self.path("etc/localtime"))?;
        time_zone_from_zoneinfo_path(&target)
    }

    fn read_trimmed(&self, relative: &str) -> Result<String, FieldError> {
        Ok(fs::read_to_string(self.path(relative))?.trim().to_string())
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInfo for LinuxHost {
    fn uptime(&self) -> Result<Duration, FieldError> {
        let content = self.read_trimmed("proc/uptime")?;
        parse_uptime(&content)
    }

    fn power(&self) -> Result<PowerState, FieldError> {
        let supply_dir = self.path("sys/class/power_supply");
        let mut entries: Vec<PathBuf> = fs::read_dir(&supply_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        for entry in entries {
            let kind = fs::read_to_string(entry.join("type")).unwrap_or_default();
            if kind.trim() != "Battery" {
                continue;
            }
            let capacity = fs::read_to_string(entry.join("capacity"))?;
            let capacity: f64 = capacity
                .trim()
                .parse()
                .map_err(|e| FieldError::Parse(format!("battery capacity: {e}")))?;
            let status = fs::read_to_string(entry.join("status")).unwrap_or_default();

            return Ok(PowerState {
                level: (capacity / 100.0).clamp(0.0, 1.0),
                state: parse_battery_status(&status),
            });
        }

        Err(FieldError::Unavailable("no battery present".to_string()))
    }

    fn model(&self) -> Result<String, FieldError> {
        let model = self.read_trimmed("sys/devices/virtual/dmi/id/product_name")?;
        non_empty(model, "product name")
    }

    fn system_version(&self) -> Result<String, FieldError> {
        match fs::read_to_string(self.path("etc/os-release")) {
            Ok(content) => parse_os_release(&content),
            Err(_) => {
                let release = self.read_trimmed("proc/sys/kernel/osrelease")?;
                non_empty(format!("Linux {release}"), "kernel release")
            }
        }
    }

    fn device_name(&self) -> Result<String, FieldError> {
        env::device_name()
    }

    fn locale(&self) -> Result<String, FieldError> {
        env::locale_from_env()
    }

    fn language(&self) -> Result<String, FieldError> {
        env::language_from_env()
    }

    fn time_zone(&self) -> Result<String, FieldError> {
        if let Ok(tz) = env::time_zone_from_env() {
            return Ok(tz);
        }
        self.time_zone_from_files()
    }

    fn display(&self) -> Result<DisplayGeometry, FieldError> {
        let drm_dir = self.path("sys/class/drm");
        let mut connectors: Vec<PathBuf> = fs::read_dir(&drm_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join("modes").exists())
            .collect();
        connectors.sort();

        for connector in connectors {
            let status = fs::read_to_string(connector.join("status")).unwrap_or_default();
            if status.trim() != "connected" {
                continue;
            }
            let modes = fs::read_to_string(connector.join("modes"))?;
            if let Some((width, height)) = modes.lines().find_map(parse_mode) {
                return Ok(DisplayGeometry {
                    width,
                    height,
                    scale: scale_from_env(),
                });
            }
        }

        Err(FieldError::Unavailable("no connected display".to_string()))
    }
}

/// First field of `/proc/uptime` is seconds since boot.
fn parse_uptime(content: &str) -> Result<Duration, FieldError> {
    let secs: f64 = content
        .split_whitespace()
        .next()
        .ok_or_else(|| FieldError::Parse("empty uptime".to_string()))?
        .parse()
        .map_err(|e| FieldError::Parse(format!("uptime: {e}")))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(FieldError::Parse(format!("uptime out of range: {secs}")));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_battery_status(status: &str) -> BatteryState {
    match status.trim() {
        "Charging" => BatteryState::Charging,
        "Discharging" | "Not charging" => BatteryState::Discharging,
        "Full" => BatteryState::Full,
        _ => BatteryState::Unknown,
    }
}

fn parse_os_release(content: &str) -> Result<String, FieldError> {
    let value = |key: &str| {
        content.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.trim().trim_matches('"').to_string())
        })
    };

    value("PRETTY_NAME")
        .filter(|v| !v.is_empty())
        .or_else(|| {
            let name = value("NAME")?;
            Some(match value("VERSION_ID") {
                Some(version) => format!("{name} {version}"),
                None => name,
            })
        })
        .ok_or_else(|| FieldError::Parse("os-release has no name".to_string()))
}

/// `/usr/share/zoneinfo/Europe/Berlin` -> `Europe/Berlin`.
fn time_zone_from_zoneinfo_path(target: &Path) -> Result<String, FieldError> {
    let text = target.to_string_lossy();
    let name = text
        .split_once("zoneinfo/")
        .map(|(_, name)| name)
        .ok_or_else(|| FieldError::Parse(format!("unexpected localtime target {text}")))?;
    env::validate_time_zone(name)
}

/// DRM mode lines look like `1920x1080` (sometimes with a trailing `i`).
fn parse_mode(line: &str) -> Option<(f64, f64)> {
    let (w, h) = line.trim().split_once('x')?;
    let h = h.trim_end_matches(|c: char| !c.is_ascii_digit());
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn scale_from_env() -> f64 {
    ["GDK_SCALE", "QT_SCALE_FACTOR"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .find(|v| *v > 0.0)
        .unwrap_or(1.0)
}

fn non_empty(value: String, what: &str) -> Result<String, FieldError> {
    if value.is_empty() {
        Err(FieldError::Unavailable(format!("{what} is empty")))
    } else {
        Ok(value)
    }
}

/// Looks for an installed desktop entry that handles `x-scheme-handler/<scheme>`.
#[derive(Debug, Clone)]
pub struct SchemeHandlerProbe {
    application_dirs: Vec<PathBuf>,
}

impl SchemeHandlerProbe {
    /// Search the XDG application directories of the current user.
    pub fn new() -> Self {
        let mut dirs_list = Vec::new();

        let data_home = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(dirs::data_dir);
        if let Some(home) = data_home {
            dirs_list.push(home.join("applications"));
        }

        let data_dirs = std::env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
        for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
            dirs_list.push(PathBuf::from(dir).join("applications"));
        }

        Self::with_dirs(dirs_list)
    }

    pub fn with_dirs(application_dirs: Vec<PathBuf>) -> Self {
        Self { application_dirs }
    }
}

impl Default for SchemeHandlerProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProbe for SchemeHandlerProbe {
    fn can_open(&self, scheme: &str) -> bool {
        let mime = format!("x-scheme-handler/{}", scheme.to_lowercase());

        self.application_dirs.iter().any(|dir| {
            let Ok(entries) = fs::read_dir(dir) else {
                return false;
            };
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map(|e| e == "desktop").unwrap_or(false))
                .any(|p| desktop_entry_handles(&p, &mime))
        })
    }
}

fn desktop_entry_handles(path: &Path, mime: &str) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    content.lines().any(|line| {
        line.strip_prefix("MimeType=")
            .map(|types| types.split(';').any(|t| t.trim().eq_ignore_ascii_case(mime)))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("device-telemetry-linux-test")
            .join(format!("{name}-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_uptime() {
        let uptime = parse_uptime("12345.67 54321.00").unwrap();
        assert_eq!(uptime.as_secs(), 12345);
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("abc 1").is_err());
    }

    #[test]
    fn test_battery_from_sysfs() {
        let root = scratch("battery");
        write(&root, "sys/class/power_supply/AC/type", "Mains\n");
        write(&root, "sys/class/power_supply/BAT0/type", "Battery\n");
        write(&root, "sys/class/power_supply/BAT0/capacity", "85\n");
        write(&root, "sys/class/power_supply/BAT0/status", "Charging\n");

        let power = LinuxHost::with_root(&root).power().unwrap();
        assert!((power.level - 0.85).abs() < 1e-9);
        assert_eq!(power.state, BatteryState::Charging);
    }

    #[test]
    fn test_no_battery_is_unavailable() {
        let root = scratch("no-battery");
        write(&root, "sys/class/power_supply/AC/type", "Mains\n");

        let err = LinuxHost::with_root(&root).power().unwrap_err();
        assert!(matches!(err, FieldError::Unavailable(_)));
    }

    #[test]
    fn test_battery_status_mapping() {
        assert_eq!(parse_battery_status("Full\n"), BatteryState::Full);
        assert_eq!(parse_battery_status("Not charging"), BatteryState::Discharging);
        assert_eq!(parse_battery_status("Discharging"), BatteryState::Discharging);
        assert_eq!(parse_battery_status("weird"), BatteryState::Unknown);
    }

    #[test]
    fn test_os_release_parsing() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"24.04\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\n";
        assert_eq!(parse_os_release(content).unwrap(), "Ubuntu 24.04 LTS");

        let content = "NAME=Alpine\nVERSION_ID=3.19\n";
        assert_eq!(parse_os_release(content).unwrap(), "Alpine 3.19");

        assert!(parse_os_release("ID=foo\n").is_err());
    }

    #[test]
    fn test_display_from_drm() {
        let root = scratch("drm");
        write(&root, "sys/class/drm/card0-DP-1/status", "disconnected\n");
        write(&root, "sys/class/drm/card0-DP-1/modes", "");
        write(&root, "sys/class/drm/card0-eDP-1/status", "connected\n");
        write(&root, "sys/class/drm/card0-eDP-1/modes", "2560x1600\n1920x1200\n");

        let geometry = LinuxHost::with_root(&root).display().unwrap();
        assert_eq!(geometry.width, 2560.0);
        assert_eq!(geometry.height, 1600.0);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("1920x1080"), Some((1920.0, 1080.0)));
        assert_eq!(parse_mode("1920x1080i"), Some((1920.0, 1080.0)));
        assert_eq!(parse_mode("garbage"), None);
    }

    #[test]
    fn test_invalid_timezone_file_falls_back_to_localtime() {
        let root = scratch("timezone");
        write(&root, "etc/timezone", "Not/AZone\n");
        std::os::unix::fs::symlink(
            "/usr/share/zoneinfo/Europe/Berlin",
            root.join("etc/localtime"),
        )
        .unwrap();

        let host = LinuxHost::with_root(&root);
        assert_eq!(host.time_zone_from_files().unwrap(), "Europe/Berlin");

        write(&root, "etc/timezone", "Asia/Tokyo\n");
        assert_eq!(host.time_zone_from_files().unwrap(), "Asia/Tokyo");
    }

    #[test]
    fn test_time_zone_from_zoneinfo_path() {
        let path = Path::new("/usr/share/zoneinfo/America/New_York");
        assert_eq!(
            time_zone_from_zoneinfo_path(path).unwrap(),
            "America/New_York"
        );
        assert!(time_zone_from_zoneinfo_path(Path::new("/etc/other")).is_err());
    }

    #[test]
    fn test_scheme_handler_probe() {
        let dir = scratch("applications");
        write(
            &dir,
            "duolingo.desktop",
            "[Desktop Entry]\nName=Duolingo\nMimeType=text/html;x-scheme-handler/duolingo;\n",
        );
        write(&dir, "notes.txt", "MimeType=x-scheme-handler/other;\n");

        let probe = SchemeHandlerProbe::with_dirs(vec![dir.clone()]);
        assert!(probe.can_open("duolingo"));
        assert!(!probe.can_open("other"));
        assert!(!probe.can_open("slack"));

        let missing = SchemeHandlerProbe::with_dirs(vec![dir.join("does-not-exist")]);
        assert!(!missing.can_open("duolingo"));
    }
}
