//! Parser for the Java standard coverage format, the common shape converters
//! emit for JVM tools:
//!
//!   <report name="cobertura">
//!     <group name="...">
//!       <package name="...">
//!         <file name="path/File.java">
//!           <class name="fully.qualified.Name">
//!             <method name="m" signature="(I)V">
//!               <line number="1" hits="1"/>
//!             </method>
//!             <line number="1" hits="1" branch="false"/>
//!             <line number="2" hits="0" branch="true" condition-coverage="50% (1/2)"/>
//!           </class>
//!         </file>
//!       </package>
//!     </group>
//!   </report>
//!
//! Each element opens at most one node under the innermost open node. Lines
//! are counted on their enclosing node and never become nodes. Unknown
//! elements are skipped without changing the active parent.

use std::io::BufRead;

use tracing::debug;

use super::{attach, attr_or, get_attr, open_root, record_line, walk_xml};
use super::{CoverageParser, ElementKinds, Format};
use crate::element::ElementRegistry;
use crate::error::Result;
use crate::model::CoverageTree;
use crate::signature::decode_method_name;

/// Java standard XML format parser.
#[derive(Debug, Clone, Default)]
pub struct JavaParser {
    kinds: ElementKinds,
}

impl JavaParser {
    pub fn new(registry: &ElementRegistry) -> Result<Self> {
        Ok(Self {
            kinds: ElementKinds::resolve(registry)?,
        })
    }
}

impl CoverageParser for JavaParser {
    fn format(&self) -> Format {
        Format::Java
    }

    fn parse(&self, reader: &mut dyn BufRead, report_name: &str) -> Result<CoverageTree> {
        let kinds = &self.kinds;

        let tree = walk_xml(reader, |e, parent, tree| {
            let node = match e.local_name().as_ref() {
                b"report" => {
                    let name = format!("{}: {}", attr_or(e, b"name", ""), report_name);
                    open_root(tree, kinds.report.clone(), name)?
                }
                b"group" => attach(tree, parent, kinds.group.clone(), attr_or(e, b"name", "project"))?,
                b"package" => attach(
                    tree,
                    parent,
                    kinds.package.clone(),
                    attr_or(e, b"name", "<default>"),
                )?,
                b"file" => {
                    let path = get_attr(e, b"name");
                    let name = path.clone().unwrap_or_default();
                    let id = attach(tree, parent, kinds.file.clone(), name)?;
                    if let Some(tree) = tree.as_mut() {
                        tree.set_relative_source_path(id, path);
                    }
                    id
                }
                b"class" => attach(tree, parent, kinds.class.clone(), attr_or(e, b"name", ""))?,
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
            "parsed java coverage report"
        );
        Ok(tree)
    }
}
