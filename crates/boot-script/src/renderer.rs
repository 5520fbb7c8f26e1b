//! iPXE script rendering
//!
//! Three templates share the `#!ipxe` header:
//! - **default**: node and configuration known, boots the kernel
//! - **minimal**: node known but no configuration matched, retries later
//! - **error**: node unknown or rendering failed, diagnostic comment block
//!   plus the same retry directive
//!
//! Templates use `{{name}}` placeholders filled in a single pass. Output never
//! contains an unresolved placeholder.

use crate::error::RenderError;
use crate::models::{BootConfiguration, Node};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Literal first line of every script
pub const IPXE_HEADER: &str = "#!ipxe";

const DEFAULT_TEMPLATE: &str = "#!ipxe
# node: {{xname}} configuration: {{config_name}}
dhcp
echo Booting {{xname}} with {{config_name}}
kernel --name {{kernel_filename}} {{kernel}}
{{initrd_line}}imgargs {{kernel_filename}} {{initrd_arg}}{{params}}
boot
";

const MINIMAL_TEMPLATE: &str = "#!ipxe
# node: {{xname}}
dhcp
echo No boot configuration for {{xname}}, retrying in {{retry_delay}}s
sleep {{retry_delay}}
chain --autofree {{retry_url}} || reboot
";

const ERROR_TEMPLATE: &str = "#!ipxe
# ==== BOOT SCRIPT ERROR ====
# identifier: {{identifier}}
# reason: {{reason}}
# ===========================
dhcp
echo Boot script unavailable for {{identifier}}, retrying in {{retry_delay}}s
sleep {{retry_delay}}
chain --autofree {{retry_url}} || reboot
";

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// URL the firmware chains to when retrying
    pub chain_url: String,
    /// Seconds to sleep before retrying
    pub retry_delay_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chain_url: "/boot/v1/bootscript?mac=${net0/mac}".to_string(),
            retry_delay_secs: 10,
        }
    }
}

/// Last path segment of a URL or path
///
/// Empty input or a trailing `/` yields an empty string.
pub fn extract_filename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or_default()
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn diagnostic(value: &str) -> String {
    single_line(value).replace(['{', '}'], "")
}

/// Replace every `{{name}}` in `template` from `bindings`
fn substitute(template: &str, bindings: &[(&str, String)]) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len() + 128);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| RenderError::MalformedTemplate("unterminated placeholder".to_string()))?;
        let name = after[..end].trim();
        let value = bindings
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| RenderError::UnresolvedPlaceholder(name.to_string()))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    if let Some(pos) = out.find("{{") {
        let leftover: String = out[pos..].chars().take(32).collect();
        return Err(RenderError::UnresolvedPlaceholder(leftover));
    }
    Ok(out)
}

/// Binds nodes and configurations into iPXE scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptRenderer {
    config: RendererConfig,
}

impl ScriptRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn retry_bindings(&self) -> [(&'static str, String); 2] {
        [
            ("retry_delay", self.config.retry_delay_secs.to_string()),
            ("retry_url", single_line(&self.config.chain_url)),
        ]
    }

    /// Render the script for a request
    ///
    /// Picks the default template when both node and configuration are
    /// present, the minimal one for a node alone and the error one when there
    /// is no node.
    pub fn render(
        &self,
        identifier: &str,
        node: Option<&Node>,
        config: Option<&BootConfiguration>,
    ) -> Result<String, RenderError> {
        match (node, config) {
            (Some(node), Some(config)) => self.render_default(node, config),
            (Some(node), None) => self.render_minimal(node),
            (None, _) => Ok(self.render_error(identifier, "no node found for identifier")),
        }
    }

    fn render_default(&self, node: &Node, config: &BootConfiguration) -> Result<String, RenderError> {
        let kernel_filename = extract_filename(&config.kernel);
        if kernel_filename.is_empty() {
            return Err(RenderError::EmptyKernelFilename(config.kernel.clone()));
        }

        let (initrd_line, initrd_arg) = if config.initrd.is_empty() {
            (String::new(), String::new())
        } else {
            let initrd_filename = extract_filename(&config.initrd);
            if initrd_filename.is_empty() {
                return Err(RenderError::EmptyInitrdFilename(config.initrd.clone()));
            }
            (
                format!(
                    "initrd --name {} {}\n",
                    single_line(initrd_filename),
                    single_line(&config.initrd)
                ),
                format!("initrd={} ", single_line(initrd_filename)),
            )
        };

        let bindings = [
            ("xname", single_line(&node.xname)),
            ("config_name", single_line(&config.name)),
            ("kernel_filename", single_line(kernel_filename)),
            ("kernel", single_line(&config.kernel)),
            ("initrd_line", initrd_line),
            ("initrd_arg", initrd_arg),
            ("params", single_line(config.params.trim())),
        ];
        substitute(DEFAULT_TEMPLATE, &bindings)
    }

    fn render_minimal(&self, node: &Node) -> Result<String, RenderError> {
        let [delay, url] = self.retry_bindings();
        let bindings = [("xname", single_line(&node.xname)), delay, url];
        substitute(MINIMAL_TEMPLATE, &bindings)
    }

    /// Render the error template; never fails
    pub fn render_error(&self, identifier: &str, reason: &str) -> String {
        let [delay, url] = self.retry_bindings();
        let bindings = [
            ("identifier", diagnostic(identifier)),
            ("reason", diagnostic(reason)),
            delay,
            url,
        ];
        substitute(ERROR_TEMPLATE, &bindings).unwrap_or_else(|e| {
            error!("Error template failed to render: {}", e);
            format!(
                "{IPXE_HEADER}\ndhcp\nsleep {}\nchain --autofree {} || reboot\n",
                self.config.retry_delay_secs,
                single_line(&self.config.chain_url)
            )
        })
    }
}

#[cfg(test)]
#[path = "renderer_test.rs"]
mod tests;
