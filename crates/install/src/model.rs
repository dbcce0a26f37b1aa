//! What the pipeline installs, and the files it derives from that

use std::path::{Path, PathBuf};

use serde_yml::{Mapping, Value};
use subi_errors::{Error, InstallError};

use crate::signal::Signal;

/// Header line of generated YAML documents consumed by cloud-init
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

/// A file written into the target to seed cloud-init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudInitFile {
    /// Path relative to the target root
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
}

/// Collaborator state the install pipeline reads
#[derive(Debug, Clone)]
pub struct InstallModel {
    /// Mount point of the system being installed
    pub target: PathBuf,
    /// All must be set before the user is asked to confirm
    pub install_events: Vec<Signal>,
    /// All must be set before final configuration starts
    pub postinstall_events: Vec<Signal>,
    pub confirmation: Signal,
    pub has_network: bool,
    pub install_ssh_server: bool,
    pub packages: Vec<String>,
    /// Base configuration handed to the install tool
    pub curtin_config: Mapping,
    /// The answers that reproduce this install
    pub autoinstall: Mapping,
    /// cloud-init user data for the installed system
    pub user_data: Mapping,
    pub instance_id: String,
}

impl InstallModel {
    #[must_use]
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            install_events: Vec::new(),
            postinstall_events: Vec::new(),
            confirmation: Signal::new(),
            has_network: true,
            install_ssh_server: false,
            packages: Vec::new(),
            curtin_config: Mapping::new(),
            autoinstall: Mapping::new(),
            user_data: Mapping::new(),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Path inside the target
    #[must_use]
    pub fn tpath(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.target.join(relative)
    }

    /// The install tool configuration, reporting events to `event_identifier`
    #[must_use]
    pub fn render(&self, event_identifier: &str) -> Mapping {
        let mut journald = Mapping::new();
        journald.insert("type".into(), "journald".into());
        journald.insert("identifier".into(), event_identifier.into());

        let mut reporting = Mapping::new();
        reporting.insert("subiquity".into(), Value::Mapping(journald));

        let mut config = self.curtin_config.clone();
        config.insert("reporting".into(), Value::Mapping(reporting));
        config
    }

    /// Packages installed after the base system, in order
    #[must_use]
    pub fn packages_to_install(&self) -> Vec<String> {
        let mut packages = Vec::new();
        if self.install_ssh_server {
            packages.push("openssh-server".to_string());
        }
        packages.extend(self.packages.iter().cloned());
        packages
    }

    /// The autoinstall capture document
    ///
    /// # Errors
    ///
    /// Returns an error if the answers cannot be serialized.
    pub fn autoinstall_document(&self) -> Result<String, Error> {
        let mut document = Mapping::new();
        document.insert(
            "autoinstall".into(),
            Value::Mapping(self.autoinstall.clone()),
        );
        Ok(format!(
            "{CLOUD_CONFIG_HEADER}{}",
            serde_yml::to_string(&document)?
        ))
    }

    /// Files that seed cloud-init in the installed system
    ///
    /// # Errors
    ///
    /// Returns an error if the user data cannot be serialized.
    pub fn cloud_init_files(&self) -> Result<Vec<CloudInitFile>, Error> {
        let userdata_raw = format!(
            "{CLOUD_CONFIG_HEADER}{}",
            serde_yml::to_string(&self.user_data)?
        );

        let mut metadata = Mapping::new();
        metadata.insert("instance-id".into(), self.instance_id.as_str().into());
        let mut none_source = Mapping::new();
        none_source.insert("metadata".into(), Value::Mapping(metadata));
        none_source.insert("userdata_raw".into(), userdata_raw.into());
        let mut datasource = Mapping::new();
        datasource.insert("None".into(), Value::Mapping(none_source));
        let mut config = Mapping::new();
        config.insert(
            "datasource_list".into(),
            Value::Sequence(vec!["None".into()]),
        );
        config.insert("datasource".into(), Value::Mapping(datasource));

        Ok(vec![
            CloudInitFile {
                path: PathBuf::from("etc/cloud/cloud.cfg.d/99-installer.cfg"),
                content: serde_yml::to_string(&config)?,
                mode: 0o600,
            },
            CloudInitFile {
                path: PathBuf::from("etc/cloud/ds-identify.cfg"),
                content: "policy: enabled\n".to_string(),
                mode: 0o644,
            },
        ])
    }
}

/// Write `files` under `target`. Blocking.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
pub fn write_cloud_init(target: &Path, files: &[CloudInitFile]) -> Result<(), Error> {
    for file in files {
        let path = target.join(&file.path);
        write_file(&path, &file.content, file.mode).map_err(|e| InstallError::CloudInitFailed {
            message: format!("{}: {e}", path.display()),
        })?;
    }
    Ok(())
}

/// Write `content` to `path` with `mode`, creating parent directories
///
/// # Errors
///
/// Returns an error if the directories or the file cannot be written.
pub fn write_file(path: &Path, content: &str, mode: u32) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    // an existing file keeps its old mode through open()
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}
