// Copyright 2020 - 2026 LG Electronics Inc.

//! Render mutation results: a console summary table, a PIT-style
//! `mutations.xml`, and a small static HTML report.

use std::fmt::Write as _;
use std::fs;

use anyhow::Context;
use camino::Utf8Path;
use console::style;
use itertools::Itertools;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::info;

use crate::aggregate::Aggregate;
use crate::outcome::{MutationResult, MutationState};
use crate::path::{relative_to, Utf8PathSlashes};
use crate::Result;

/// Print the per-file coverage table to stdout.
pub fn print_summary(aggregate: &Aggregate, source_root: &Utf8Path) {
    const FILE_WIDTH: usize = 50;
    const NUM_WIDTH: usize = 10;
    let total_width = FILE_WIDTH + 3 * NUM_WIDTH;
    let rule = "-".repeat(total_width);

    println!("{rule}");
    println!("{:^total_width$}", "Mutation Coverage Report");
    println!("Directory: {source_root}");
    println!("{rule}");
    println!(
        "{:<FILE_WIDTH$}{:>NUM_WIDTH$}{:>NUM_WIDTH$}{:>NUM_WIDTH$}",
        "File", "#killed", "#mutation", "cov"
    );
    println!("{rule}");
    for (path, group) in &aggregate.by_file {
        let name = abbreviate(path.as_str(), FILE_WIDTH);
        println!(
            "{:<FILE_WIDTH$}{:>NUM_WIDTH$}{:>NUM_WIDTH$}{:>NUM_WIDTH$}",
            name,
            group.stats.detected,
            group.stats.total,
            coverage_cell(group.stats.coverage_percent()),
        );
    }
    println!("{rule}");
    let totals = &aggregate.totals;
    println!(
        "{:<FILE_WIDTH$}{:>NUM_WIDTH$}{:>NUM_WIDTH$}{:>NUM_WIDTH$}",
        style("TOTAL").bold(),
        totals.detected,
        totals.total,
        coverage_cell(totals.coverage_percent()),
    );
    if totals.denominator() != totals.total {
        println!(
            "({} of {} mutants were skipped as build failures, runtime errors or timeouts)",
            totals.total - totals.denominator(),
            totals.total
        );
    }
    println!("{rule}");
}

fn coverage_cell(percent: Option<usize>) -> String {
    match percent {
        Some(percent) => format!("{percent}%"),
        None => "-".to_owned(),
    }
}

fn abbreviate(name: &str, width: usize) -> String {
    if name.len() <= width {
        return name.to_owned();
    }
    let keep = width - 4;
    format!("... {}", &name[name.len() - keep..])
}

/// Write `mutations.xml`: one `<mutation>` element per result. Results
/// that never reached a comparable test run carry `detected="skip"`.
pub fn write_xml_report(
    results: &[MutationResult],
    source_root: &Utf8Path,
    output_dir: &Utf8Path,
) -> Result<()> {
    fs::create_dir_all(output_dir).with_context(|| format!("create {output_dir:?}"))?;
    let mut buf: Vec<u8> = Vec::new();
    let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    writer.write_event(Event::Start(BytesStart::new("mutations")))?;
    for result in results {
        let skip = result.skipped_in_coverage();
        let mut mutation = BytesStart::new("mutation");
        let detected = if skip {
            "skip".to_owned()
        } else {
            result.detected().to_string()
        };
        mutation.push_attribute(("detected", detected.as_str()));
        writer.write_event(Event::Start(mutation))?;

        let mutant = &result.mutant;
        let relative = relative_to(&mutant.path, source_root);
        write_element(
            &mut writer,
            "sourceFile",
            mutant.path.file_name().unwrap_or_default(),
        )?;
        write_element(&mut writer, "sourceFilePath", relative.as_str())?;
        write_element(&mut writer, "mutatedClass", mutant.class())?;
        write_element(&mut writer, "mutatedMethod", mutant.function())?;
        write_element(
            &mut writer,
            "lineNumber",
            &mutant.span.start.line.to_string(),
        )?;
        write_element(&mut writer, "mutator", &mutant.operator.to_string())?;
        let killing = if skip {
            String::new()
        } else {
            result.killing_tests.iter().join(", ")
        };
        write_element(&mut writer, "killingTest", &killing)?;

        writer.write_event(Event::End(BytesEnd::new("mutation")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("mutations")))?;

    let path = output_dir.join("mutations.xml");
    fs::write(&path, &buf).with_context(|| format!("write {path:?}"))?;
    info!(%path, "wrote XML report");
    Ok(())
}

fn write_element(writer: &mut Writer<&mut Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; color: #222; }
table { border-collapse: collapse; margin: 1em 0; }
th, td { border: 1px solid #bbb; padding: 4px 10px; text-align: left; }
th { background: #eee; }
td.num { text-align: right; }
.killed { background: #dfd; }
.survived { background: #fdd; }
.skipped { background: #ffd; }
pre { margin: 0; }
.line-killed { background: #dfd; }
.line-survived { background: #fdd; }
.mutants { color: #555; font-size: 85%; margin-left: 4em; }
"#;

/// Write `index.html` plus one annotated page per mutated source file.
pub fn write_html_report(
    results: &[MutationResult],
    aggregate: &Aggregate,
    source_root: &Utf8Path,
    output_dir: &Utf8Path,
) -> Result<()> {
    fs::create_dir_all(output_dir).with_context(|| format!("create {output_dir:?}"))?;
    let mut index = String::new();
    let _ = write!(
        index,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <title>Mutation Coverage Report</title><style>{STYLE}</style></head><body>\
         <h1>Mutation Coverage Report</h1>\
         <p>Source root: {}</p>",
        escape(source_root.as_str())
    );
    let totals = &aggregate.totals;
    let _ = write!(
        index,
        "<p>{} of {} viable mutants killed ({}); {} mutants in total.</p>",
        totals.detected,
        totals.denominator(),
        coverage_cell(totals.coverage_percent()),
        totals.total,
    );

    index.push_str("<h2>By directory</h2><table><tr><th>Directory</th><th>#killed</th><th>#mutation</th><th>cov</th></tr>");
    // Directories use the legacy dotted keys, as in the reports the
    // original consumers of this format expect.
    for (name, group) in aggregate.legacy_dir_groups() {
        let _ = write!(
            index,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            escape(&name),
            group.stats.detected,
            group.stats.total,
            coverage_cell(group.stats.coverage_percent()),
        );
    }
    index.push_str("</table>");

    index.push_str("<h2>By file</h2><table><tr><th>File</th><th>#killed</th><th>#mutation</th><th>cov</th></tr>");
    let file_dir = output_dir.join("files");
    fs::create_dir_all(&file_dir).with_context(|| format!("create {file_dir:?}"))?;
    for (path, group) in &aggregate.by_file {
        let page = file_page_name(path);
        let _ = write!(
            index,
            "<tr><td><a href=\"files/{page}\">{}</a></td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            escape(path.as_str()),
            group.stats.detected,
            group.stats.total,
            coverage_cell(group.stats.coverage_percent()),
        );
        let page_html = render_file_page(path, group, results, source_root);
        let page_path = file_dir.join(&page);
        fs::write(&page_path, page_html).with_context(|| format!("write {page_path:?}"))?;
    }
    index.push_str("</table></body></html>");

    let index_path = output_dir.join("index.html");
    fs::write(&index_path, index).with_context(|| format!("write {index_path:?}"))?;
    info!(%index_path, "wrote HTML report");
    Ok(())
}

fn file_page_name(path: &Utf8Path) -> String {
    format!("{}.html", path.to_slash_path().replace('/', "__"))
}

fn render_file_page(
    relative: &Utf8Path,
    group: &crate::aggregate::Group,
    results: &[MutationResult],
    source_root: &Utf8Path,
) -> String {
    let mut page = String::new();
    let _ = write!(
        page,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{0}</title>\
         <style>{STYLE}</style></head><body><h1>{0}</h1>",
        escape(relative.as_str())
    );
    let _ = write!(
        page,
        "<p>{} of {} mutants killed.</p>",
        group.stats.detected, group.stats.total
    );

    // Mutants grouped by line, to annotate the listing below.
    let mut by_line: std::collections::BTreeMap<usize, Vec<&MutationResult>> = Default::default();
    for index in &group.result_indexes {
        let result = &results[*index];
        by_line
            .entry(result.mutant.span.start.line)
            .or_default()
            .push(result);
    }

    match fs::read_to_string(source_root.join(relative)) {
        Ok(code) => {
            page.push_str("<pre>");
            for (idx, line) in code.lines().enumerate() {
                let line_no = idx + 1;
                let class = by_line.get(&line_no).map(|results| {
                    if results.iter().all(|r| r.detected()) {
                        "line-killed"
                    } else {
                        "line-survived"
                    }
                });
                match class {
                    Some(class) => {
                        let _ = write!(
                            page,
                            "<span class=\"{class}\">{line_no:>5} {}</span>\n",
                            escape(line)
                        );
                    }
                    None => {
                        let _ = write!(page, "{line_no:>5} {}\n", escape(line));
                    }
                }
                if let Some(line_results) = by_line.get(&line_no) {
                    for result in line_results {
                        let _ = write!(
                            page,
                            "<span class=\"mutants\">{} -&gt; {:?}: {}{}</span>\n",
                            result.mutant.operator,
                            result.mutant.replacement,
                            result.state,
                            if result.killing_tests.is_empty() {
                                String::new()
                            } else {
                                format!(" (killed by {})", result.killing_tests.iter().join(", "))
                            }
                        );
                    }
                }
            }
            page.push_str("</pre>");
        }
        Err(_) => {
            // The report can be rendered away from the source tree.
            page.push_str("<table><tr><th>Line</th><th>Mutator</th><th>Replacement</th><th>State</th></tr>");
            for (line_no, line_results) in &by_line {
                for result in line_results {
                    let _ = write!(
                        page,
                        "<tr class=\"{}\"><td class=\"num\">{line_no}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                        state_class(result.state),
                        result.mutant.operator,
                        escape(&result.mutant.replacement),
                        result.state,
                    );
                }
            }
            page.push_str("</table>");
        }
    }
    page.push_str("</body></html>");
    page
}

fn state_class(state: MutationState) -> &'static str {
    match state {
        MutationState::Killed => "killed",
        MutationState::Survived => "survived",
        MutationState::BuildFailure | MutationState::RuntimeError | MutationState::Timeout => {
            "skipped"
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
