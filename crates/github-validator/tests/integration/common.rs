use anyhow::Result;

use assert_cmd::{Command, cargo};

pub enum OutputMode {
    Stdout,
    Stderr,
    Both,
}

pub struct Validator {
    cmd: Command,
    api_key: Option<String>,
    base_url: Option<String>,
    config: Option<String>,
    no_config: bool,
    output: OutputMode,
    expects_failure: bool,
}

impl Validator {
    /// Create a new validator runner.
    pub fn new() -> Self {
        let mut cmd = Command::new(cargo::cargo_bin!());

        // The child process starts with a clean environment, so that
        // tokens or hosts from the developer's shell never leak in.
        cmd.env_clear();

        Self {
            cmd,
            api_key: Some("ghp_test".into()),
            base_url: None,
            config: None,
            no_config: true,
            output: OutputMode::Stdout,
            expects_failure: false,
        }
    }

    pub fn args<'a>(mut self, args: impl IntoIterator<Item = &'a str>) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn setenv(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn api_key(mut self, key: Option<&str>) -> Self {
        self.api_key = key.map(Into::into);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self.no_config = false;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn expects_failure(mut self, flag: bool) -> Self {
        if flag {
            self = self.output(OutputMode::Both);
        }
        self.expects_failure = flag;
        self
    }

    pub fn run(mut self) -> Result<String> {
        if let Some(api_key) = &self.api_key {
            self.cmd.arg("--api-key").arg(api_key);
        }

        if let Some(base_url) = &self.base_url {
            self.cmd.arg("--base-url").arg(base_url);
        }

        if self.no_config {
            self.cmd.arg("--no-config");
        }

        if let Some(config) = &self.config {
            self.cmd.arg("--config").arg(config);
        }

        // Progress bars misbehave with multiple spans and no terminal.
        self.cmd.arg("--no-progress").arg("--color=never");

        let output = self.cmd.output()?;

        let mut raw = match self.output {
            OutputMode::Stdout => String::from_utf8(output.stdout)?,
            OutputMode::Stderr => String::from_utf8(output.stderr)?,
            OutputMode::Both => {
                let mut raw = String::from_utf8(output.stderr)?;
                raw.push_str(std::str::from_utf8(&output.stdout)?);
                raw
            }
        };

        if let Some(exit_code) = output.status.code() {
            // 1 is a fatal error, 2 is a usage error and 101 is a panic.
            let is_failure = matches!(exit_code, 1 | 2 | 101);
            if is_failure != self.expects_failure {
                anyhow::bail!("unexpected exit code {exit_code}, output:\n{raw}");
            }
        }

        raw = raw.replace(env!("CARGO_PKG_VERSION"), "@@VERSION@@");

        Ok(raw)
    }
}

pub fn validator() -> Validator {
    Validator::new()
}
