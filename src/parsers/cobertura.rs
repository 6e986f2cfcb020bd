//! Parser for Cobertura XML coverage reports.
//!
//! Cobertura XML structure:
//!   <coverage>
//!     <sources><source>...</source></sources>
//!     <packages>
//!       <package name="...">
//!         <classes>
//!           <class name="..." filename="..." line-rate="..." branch-rate="...">
//!             <methods>
//!               <method name="..." signature="..." line-rate="...">
//!                 <lines><line number="..." hits="..." .../></lines>
//!               </method>
//!             </methods>
//!             <lines>
//!               <line number="..." hits="..." branch="true|false"
//!                     condition-coverage="50% (1/2)" />
//!             </lines>
//!           </class>
//!         </classes>
//!       </package>
//!     </packages>
//!   </coverage>
//!
//! Cobertura has no file element, so each `<class>` opens a File node keyed by
//! its `filename` attribute with the Class node below it. Classes sharing a
//! filename end up under the same File node. The precomputed `line-rate` and
//! `branch-rate` attributes are ignored; counts come from the lines.

use std::io::BufRead;

use tracing::debug;

use super::{attach, attr_or, get_attr, open_root, record_line, walk_xml};
use super::{CoverageParser, ElementKinds, Format};
use crate::element::ElementRegistry;
use crate::error::Result;
use crate::model::CoverageTree;
use crate::signature::decode_method_name;

/// Cobertura XML format parser.
#[derive(Debug, Clone, Default)]
pub struct CoberturaParser {
    kinds: ElementKinds,
}

impl CoberturaParser {
    pub fn new(registry: &ElementRegistry) -> Result<Self> {
        Ok(Self {
            kinds: ElementKinds::resolve(registry)?,
        })
    }
}

impl CoverageParser for CoberturaParser {
    fn format(&self) -> Format {
        Format::Cobertura
    }

    fn parse(&self, reader: &mut dyn BufRead, report_name: &str) -> Result<CoverageTree> {
        let kinds = &self.kinds;

        let tree = walk_xml(reader, |e, parent, tree| {
            let node = match e.local_name().as_ref() {
                b"coverage" => {
                    open_root(tree, kinds.report.clone(), format!("cobertura: {}", report_name))?
                }
                b"package" => attach(
                    tree,
                    parent,
                    kinds.package.clone(),
                    attr_or(e, b"name", "<default>"),
                )?,
                b"class" => {
                    let filename = get_attr(e, b"filename");
                    let file = attach(
                        tree,
                        parent,
                        kinds.file.clone(),
                        filename.clone().unwrap_or_default(),
                    )?;
                    if let Some(tree) = tree.as_mut() {
                        if tree.node(file).relative_source_path().is_none() {
                            tree.set_relative_source_path(file, filename);
                        }
                    }
                    attach(tree, Some(file), kinds.class.clone(), attr_or(e, b"name", ""))?
                }
                b"method" => {
                    let name = decode_method_name(
                        &attr_or(e, b"name", ""),
                        &attr_or(e, b"signature", ""),
                    );
                    attach(tree, parent, kinds.method.clone(), name)?
                }
                b"line" => {
                    record_line(tree, parent, e)?;
                    return Ok(None);
                }
                _ => return Ok(None),
            };
            Ok(Some(node))
        })?;

        debug!(
            report = report_name,
            nodes = tree.node_count(),
            "parsed cobertura coverage report"
        );
        Ok(tree)
    }
}
