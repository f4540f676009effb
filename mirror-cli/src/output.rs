use crate::{cli::OutputFormat, error::Result};
use colored::*;
use mirror_resolver::{ProviderDescriptor, ResolutionReport, StreamRecord, StreamsResponse};
use std::{io::Write, path::Path, sync::Arc};

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_streams(
        &self,
        response: &StreamsResponse,
        report: &ResolutionReport,
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_pretty(&response.streams, report)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
            OutputFormat::JsonCompact => Ok(serde_json::to_string(response)?),
        }
    }

    fn format_pretty(&self, streams: &[StreamRecord], report: &ResolutionReport) -> String {
        let mut output = String::new();

        output.push_str(&self.colorize("Resolution Summary:", &Color::Green, true));
        output.push('\n');
        for (label, value) in [
            ("Attempted", report.attempted),
            ("Resolved", report.resolved()),
            ("Failed", report.failed),
            ("Unroutable", report.unroutable),
            ("Duplicates", report.duplicates),
        ] {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize(label, &Color::Yellow, false),
                self.colorize(&value.to_string(), &Color::Cyan, false)
            ));
        }

        for (index, stream) in streams.iter().enumerate() {
            output.push('\n');
            output.push_str(&self.colorize(
                &format!("[{}] {}", index + 1, stream.name),
                &Color::Green,
                true,
            ));
            output.push('\n');

            for line in stream.description.lines() {
                output.push_str(&format!("  {line}\n"));
            }
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize("URL", &Color::Yellow, false),
                self.colorize(&stream.url, &Color::Blue, false)
            ));
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize("Filename", &Color::Yellow, false),
                stream.behavior_hints.filename
            ));

            let request_headers = stream
                .behavior_hints
                .proxy_headers
                .as_ref()
                .and_then(|headers| headers.request.as_ref());
            if let Some(headers) = request_headers {
                output.push_str(&format!(
                    "  {}:\n",
                    self.colorize("Request Headers", &Color::Yellow, false)
                ));
                for (name, value) in headers {
                    output.push_str(&format!("    {name}: {value}\n"));
                }
            }
        }

        if streams.is_empty() {
            output.push('\n');
            output.push_str(&self.colorize("No streams resolved", &Color::Red, false));
            output.push('\n');
        }

        output
    }

    pub fn format_providers(
        &self,
        providers: &[Arc<ProviderDescriptor>],
        detailed: bool,
    ) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize("Supported Providers:", &Color::Green, true));
        output.push('\n');

        for provider in providers {
            let mut line = format!("  {}", self.colorize(&provider.name, &Color::Cyan, false));
            if provider.requires_privilege {
                let tag = self.colorize("(privileged)", &Color::Magenta, false);
                line.push_str(&format!(" {tag}"));
            }
            if !provider.enabled {
                line.push_str(&format!(" {}", self.colorize("(disabled)", &Color::Red, false)));
            }
            output.push_str(&line);
            output.push('\n');

            if detailed {
                if !provider.domain_patterns.is_empty() {
                    let domains = provider.domain_patterns.join(", ");
                    output.push_str(&format!("    domains: {domains}\n"));
                }
                if !provider.aliases.is_empty() {
                    output.push_str(&format!("    aliases: {}\n", provider.aliases.join(", ")));
                }
            }
        }

        output
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        if !self.colored {
            return text.to_string();
        }
        let colored = text.color(*color);
        if bold {
            colored.bold().to_string()
        } else {
            colored.to_string()
        }
    }
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            file.write_all(content.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => println!("{content}"),
    }
    Ok(())
}
