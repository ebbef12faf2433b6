//! CSS unit backed by lightningcss.
//!
//! Parses the stylesheet, applies vendor prefixing for the configured browser
//! targets and prints it back out, minified in minify mode. A source map
//! pointing at the unit's input is produced when source maps are enabled.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use super::{Transform, TransformError, TransformOptions};
use crate::artifact::{to_slash, Artifact, AssetKind};
use crate::config::CssTargets;

/// `css`: style → style.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssUnit;

/// Encode a major browser version the way lightningcss expects (`major << 16`).
fn version(major: Option<u32>) -> Option<u32> {
    major.map(|v| v << 16)
}

fn targets_for(config: &CssTargets) -> Targets {
    if config.is_empty() {
        return Targets::default();
    }
    let browsers = Browsers {
        chrome: version(config.chrome),
        firefox: version(config.firefox),
        safari: version(config.safari),
        edge: version(config.edge),
        ios_saf: version(config.ios_saf),
        ..Browsers::default()
    };
    Targets::from(browsers)
}

impl Transform for CssUnit {
    fn name(&self) -> &str {
        "css"
    }

    fn accepts(&self) -> AssetKind {
        AssetKind::Style
    }

    fn produces(&self) -> AssetKind {
        AssetKind::Style
    }

    fn apply(
        &self,
        input: Artifact,
        options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError> {
        let code = input.text().map_err(TransformError::not_utf8)?;
        let filename = to_slash(&input.path);
        let targets = targets_for(&options.css_targets);

        let mut sheet = StyleSheet::parse(
            code,
            ParserOptions { filename: filename.clone(), ..ParserOptions::default() },
        )
        .map_err(|e| {
            let message = e.kind.to_string();
            match e.loc {
                Some(loc) => TransformError::with_line(loc.line as usize + 1, message),
                None => TransformError::new(message),
            }
        })?;

        if options.minify || !options.css_targets.is_empty() {
            sheet
                .minify(MinifyOptions { targets, ..MinifyOptions::default() })
                .map_err(|e| TransformError::new(e.kind.to_string()))?;
        }

        let mut source_map = if options.source_maps {
            let mut map = SourceMap::new("/");
            map.add_source(&filename);
            map.set_source_content(0, code)
                .map_err(|e| TransformError::new(format!("source map: {:?}", e)))?;
            Some(map)
        } else {
            None
        };

        let printed = sheet
            .to_css(PrinterOptions {
                minify: options.minify,
                source_map: source_map.as_mut(),
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| TransformError::new(e.kind.to_string()))?;

        let mut output = input.derive(AssetKind::Style, printed.code);
        if let Some(mut map) = source_map {
            let json =
                map.to_json(None).map_err(|e| TransformError::new(format!("source map: {:?}", e)))?;
            output = output.with_source_map(json);
        } else {
            output.source_map = input.source_map.clone();
        }

        Ok(vec![output])
    }
}
