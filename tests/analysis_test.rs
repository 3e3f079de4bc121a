//! End-to-end analysis scenarios over synthetic program bundles.

mod common;

use capscope::frontend::bundle::build_program;
use capscope::types::{Capability, Finding};
use capscope::Classifier;
use common::*;
use std::collections::BTreeSet;

fn capabilities_of(findings: &[Finding], function: &str) -> BTreeSet<Capability> {
    findings
        .iter()
        .filter(|f| f.function_name() == Some(function))
        .map(|f| f.capability)
        .collect()
}

#[test]
fn test_init_only_payload_reports_all_capabilities() {
    let report = analyze_sources(payload_sources(), Classifier::builtin());
    let caps = capabilities_of(&report.findings, "example.com/payload.init");
    let expected: BTreeSet<Capability> = [
        Capability::Files,
        Capability::Network,
        Capability::ReadSystemState,
        Capability::ModifySystemState,
        Capability::OperatingSystem,
        Capability::Exec,
    ]
    .into_iter()
    .collect();
    assert_eq!(caps, expected);
    // Serializing the environment goes through a vetted function and adds
    // nothing.
    assert!(!caps.contains(&Capability::Reflect));
    // Each capability appears exactly once for the initializer.
    assert_eq!(report.findings.len(), expected.len());
}

#[test]
fn test_payload_files_witness_goes_through_command() {
    let report = analyze_sources(payload_sources(), Classifier::builtin());
    let files = report
        .findings
        .iter()
        .find(|f| f.capability == Capability::Files)
        .expect("FILES finding");
    assert_eq!(
        files.dep_path,
        "example.com/payload.init os/exec.Command os/exec.LookPath"
    );
    // The leaf step carries the call site inside Command.
    let leaf = files.path.last().unwrap();
    let site = leaf.site.as_ref().expect("call site");
    assert_eq!((site.filename.as_str(), site.line), ("exec.x", 22));
    // The first step never has a site.
    assert!(files.path[0].site.is_none());
}

#[test]
fn test_interface_dispatch_narrowed_by_concrete_type() {
    let report = analyze_sources(dispatch_sources(), Classifier::builtin());
    // Dispatch on the harmless concrete type: nothing to report, even though
    // another implementation elsewhere in the program reads process state.
    assert!(capabilities_of(&report.findings, "example.com/app.UseB").is_empty());
    // Dispatch through the interface over-approximates to all implementers.
    assert_eq!(
        capabilities_of(&report.findings, "example.com/app.UseAny"),
        [Capability::ReadSystemState].into_iter().collect()
    );
    // The noisy implementation itself is reported; it is in a queried
    // package.
    assert_eq!(
        capabilities_of(&report.findings, "(example.com/app.A).Say"),
        [Capability::ReadSystemState].into_iter().collect()
    );
}

#[test]
fn test_sort_rewrite_witness_through_element_methods() {
    let report = analyze_sources(sort_sources(), Classifier::builtin());
    let finding = report
        .findings
        .iter()
        .find(|f| {
            f.function_name() == Some("example.com/app.SortRecords")
                && f.capability == Capability::ReadSystemState
        })
        .expect("SortRecords should gain READ_SYSTEM_STATE");
    assert_eq!(
        finding.dep_path,
        "example.com/app.SortRecords (example.com/app.Records).Less os.Getpid"
    );
    assert!(!finding.dep_path.contains("sort.Sort"));
}

#[test]
fn test_indirect_sort_call_reported_unanalyzed() {
    let report = analyze_sources(sort_sources(), Classifier::builtin());
    let caps = capabilities_of(&report.findings, "example.com/app.SortIndirect");
    assert_eq!(caps, [Capability::Unanalyzed].into_iter().collect());
    let finding = report
        .findings
        .iter()
        .find(|f| f.function_name() == Some("example.com/app.SortIndirect"))
        .unwrap();
    assert_eq!(finding.dep_path, "example.com/app.SortIndirect sort.Sort");
}

#[test]
fn test_rewriting_preserves_capability_findings() {
    // With a map that does not categorize the sort machinery, the findings
    // for the capability reached through Less are identical with and without
    // rewriting; only the witness changes shape.
    let classifier =
        Classifier::load("t", "func os.Getpid READ_SYSTEM_STATE\n", true).unwrap();

    let build_findings = |rewritten: bool| {
        let mut sources = sort_with_body_sources();
        if rewritten {
            capscope::rewrite::rewrite_sources(&mut sources);
        }
        let built = build_program(&sources).unwrap();
        let scan = capscope::scanner::scan(&sources, &built.graph);
        let labels = capscope::analyzer::assign_labels(&built.graph, &classifier, &scan);
        let queried: BTreeSet<String> = sources.roots.iter().cloned().collect();
        capscope::analyzer::get_capability_info(
            &built.graph,
            &labels,
            &queried,
            &classifier,
            &built.package_names,
        )
    };

    let before = build_findings(false);
    let after = build_findings(true);

    let keys = |findings: &[Finding]| -> BTreeSet<(String, Capability)> {
        findings
            .iter()
            .filter(|f| f.capability == Capability::ReadSystemState)
            .map(|f| (f.function_name().unwrap().to_string(), f.capability))
            .collect()
    };
    assert_eq!(keys(&before), keys(&after));

    let witness = |findings: &[Finding]| {
        findings
            .iter()
            .find(|f| {
                f.function_name() == Some("example.com/app.SortRecords")
                    && f.capability == Capability::ReadSystemState
            })
            .map(|f| f.dep_path.clone())
            .unwrap()
    };
    assert!(witness(&before).contains("sort.Sort"));
    assert!(!witness(&after).contains("sort.Sort"));
    assert!(witness(&after).contains("(example.com/app.Records).Less"));
}

/// Like `sort_sources`, but with a `sort.Sort` body that dispatches on its
/// interface parameter, so the unrewritten program still reaches the element
/// methods.
fn sort_with_body_sources() -> capscope::ProgramSources {
    let mut sources = sort_sources();
    let sort_iface = interface_type(
        &mut sources.types,
        "sort.Interface",
        &["Len", "Less", "Swap"],
    );
    sources.packages.push(package(
        "sort",
        "sort",
        vec![func(
            "sort.Sort",
            vec![
                call_stmt(call(selector(typed_ident("data", sort_iface), "Less"), vec![])),
                call_stmt(call(selector(typed_ident("data", sort_iface), "Swap"), vec![])),
                call_stmt(call(selector(typed_ident("data", sort_iface), "Len"), vec![])),
            ],
        )],
        vec![],
    ));
    sources
}

#[test]
fn test_unsafe_pointer_conversion_detected() {
    let report = analyze_sources(unsafe_sources(), Classifier::builtin());
    assert_eq!(
        capabilities_of(&report.findings, "example.com/app.Cast"),
        [Capability::UnsafePointer].into_iter().collect()
    );
    // Converting to the machine-word integer is not an escape.
    assert!(capabilities_of(&report.findings, "example.com/app.ToWord").is_empty());
}

#[test]
fn test_reflect_aliasing_detected() {
    let report = analyze_sources(reflect_sources(), Classifier::builtin());
    assert_eq!(
        capabilities_of(&report.findings, "example.com/app.LeakValue"),
        [Capability::Reflect].into_iter().collect()
    );
    assert!(capabilities_of(&report.findings, "example.com/app.LocalCopy").is_empty());
}

#[test]
fn test_safe_classification_suppresses_everything() {
    // Classify the noisy method safe: neither it nor its callers appear.
    let classifier = Classifier::load(
        "t",
        "func (example.com/app.A).Say SAFE\n",
        false,
    )
    .unwrap();
    let report = analyze_sources(dispatch_sources(), classifier);
    assert!(report.findings.iter().all(|f| {
        f.path
            .iter()
            .all(|s| s.name != "(example.com/app.A).Say")
    }));
    assert!(capabilities_of(&report.findings, "example.com/app.UseAny").is_empty());
}

#[test]
fn test_determinism_across_runs() {
    let run = || {
        let report = analyze_sources(payload_sources(), Classifier::builtin());
        serde_json::to_string(&report.findings).unwrap()
    };
    let first = run();
    for _ in 0..3 {
        assert_eq!(run(), first);
    }
}

#[test]
fn test_package_granularity_is_function_projection() {
    use capscope::report::shape_findings;
    use capscope::types::Granularity;
    use std::collections::BTreeMap;

    let report = analyze_sources(dispatch_sources(), Classifier::builtin());
    let by_function = shape_findings(
        report.findings.clone(),
        Granularity::Function,
        None,
        &BTreeMap::new(),
    );
    let by_package = shape_findings(
        report.findings.clone(),
        Granularity::Package,
        None,
        &BTreeMap::new(),
    );
    let projected: BTreeSet<(Capability, String)> = by_function
        .iter()
        .map(|f| (f.capability, f.package_dir.clone()))
        .collect();
    let direct: BTreeSet<(Capability, String)> = by_package
        .iter()
        .map(|f| (f.capability, f.package_dir.clone()))
        .collect();
    assert_eq!(projected, direct);
}
