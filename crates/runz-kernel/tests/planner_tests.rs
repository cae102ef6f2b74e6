//! Call planner tests over the in-memory package discovery.

use std::sync::Arc;

use runz_kernel::{
    CallId, CallParams, Location, MapDiscovery, PackageResolver, Plan, Planner,
};
use runz_types::{Action, RunError, IF_PRESENT};

fn resolver_with(packages: &[(&str, Option<&str>, &[(&str, &str)])]) -> PackageResolver {
    let mut disc = MapDiscovery::new();
    for (path, name, scripts) in packages {
        disc.package(path, *name, scripts);
    }
    PackageResolver::new(Arc::new(disc))
}

async fn plan_task(resolver: &PackageResolver, path: &str, task: &str) -> Plan {
    let pkg = resolver
        .get(&Location::new(path))
        .await
        .expect("discovery should not fail")
        .expect("package should exist");
    let task = pkg.task(task).expect("task should exist");
    Planner::new(resolver)
        .plan(task, CallParams::new())
        .await
        .expect("planning should succeed")
}

fn call_by_name(plan: &Plan, name: &str) -> CallId {
    plan.calls()
        .find(|(_, c)| c.task().name() == name)
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no call for task {name}"))
}

/// `(task name, prerequisite task names)` per call, in insertion order.
fn shape(plan: &Plan) -> Vec<(String, Vec<String>)> {
    plan.calls()
        .map(|(_, c)| {
            let pre = c
                .prerequisites()
                .iter()
                .map(|&p| plan.call(p).task().name().to_string())
                .collect();
            (c.task().name().to_string(), pre)
        })
        .collect()
}

#[tokio::test]
async fn transitive_walk_deduplicates() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[
            ("all", "run-z a b"),
            ("a", "run-z shared/k=1"),
            ("b", "run-z shared/k=2"),
            ("shared", "echo shared"),
        ],
    )]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    // One call per task, even though `shared` has two call-sites.
    assert_eq!(plan.len(), 4);
    let shared = plan.call(call_by_name(&plan, "shared"));
    assert_eq!(
        shared.attrs().get("k"),
        Some(&["1".to_string(), "2".to_string()][..])
    );
}

#[tokio::test]
async fn repeated_refs_merge_args_and_edges() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[("all", "run-z c/-x c/-y"), ("c", "echo c")],
    )]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    assert_eq!(plan.len(), 2);
    let entry = plan.call(plan.entry());
    assert_eq!(entry.prerequisites().len(), 1);
    let c = plan.call(call_by_name(&plan, "c"));
    assert_eq!(c.args(), ["-x", "-y"]);
}

#[tokio::test]
async fn comma_marks_siblings_parallel() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[
            ("all", "run-z a,b c"),
            ("a", "echo a"),
            ("b", "echo b"),
            ("c", "echo c"),
        ],
    )]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    let a = call_by_name(&plan, "a");
    let b = call_by_name(&plan, "b");
    let c = call_by_name(&plan, "c");
    assert!(plan.are_parallel(a, b));
    assert!(plan.are_parallel(b, a), "the relation is symmetric");
    assert!(!plan.are_parallel(b, c));
    assert!(!plan.are_parallel(a, c));
    assert!(!plan.are_parallel(a, a), "never reflexive");
}

#[tokio::test]
async fn group_parallelism_covers_members() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[
            ("all", "run-z g1,g2"),
            ("g1", "run-z x"),
            ("g2", "run-z y"),
            ("x", "echo x"),
            ("y", "echo y"),
        ],
    )]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    let x = call_by_name(&plan, "x");
    let y = call_by_name(&plan, "y");
    let g2 = call_by_name(&plan, "g2");
    assert!(plan.are_parallel(x, y), "members of parallel groups overlap");
    assert!(plan.are_parallel(x, g2));
    // The entry is not parallel with anything.
    assert!(!plan.are_parallel(plan.entry(), x));
}

#[tokio::test]
async fn selectors_retarget_following_refs() {
    let resolver = resolver_with(&[
        ("/repo", Some("repo"), &[("all", "run-z ./a build ./b build")]),
        ("/repo/a", Some("a"), &[("build", "echo a")]),
        ("/repo/b", Some("b"), &[("build", "echo b")]),
    ]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    assert_eq!(plan.len(), 3);
    let labels: Vec<String> = plan.calls().map(|(_, c)| c.label()).collect();
    assert!(labels.contains(&"/repo/a:build".to_string()));
    assert!(labels.contains(&"/repo/b:build".to_string()));
}

#[tokio::test]
async fn consecutive_selectors_fan_one_ref_out() {
    let resolver = resolver_with(&[
        ("/repo", Some("repo"), &[("all", "run-z ./a ./b build")]),
        ("/repo/a", Some("a"), &[("build", "echo a")]),
        ("/repo/b", Some("b"), &[("build", "echo b")]),
    ]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    assert_eq!(plan.len(), 3);
    assert_eq!(plan.call(plan.entry()).prerequisites().len(), 2);
}

#[tokio::test]
async fn missing_selector_package_aborts_planning() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[("all", "run-z ./nope build")],
    )]);
    let pkg = resolver.get(&Location::new("/repo")).await.unwrap().unwrap();
    let task = pkg.task("all").unwrap();
    let err = Planner::new(&resolver)
        .plan(task, CallParams::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::UnknownTask { task_name, .. } if task_name == "./nope"
    ));
}

#[tokio::test]
async fn absent_task_materializes_as_unknown() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[("test", "run-z absent =if-present")],
    )]);
    let plan = plan_task(&resolver, "/repo", "test").await;

    let absent = plan.call(call_by_name(&plan, "absent"));
    assert!(matches!(absent.task().action(), Action::Unknown));
    assert!(absent.effective_attrs().contains(IF_PRESENT));
}

#[tokio::test]
async fn absent_task_plans_without_if_present_too() {
    // Resolution failure surfaces at execution, not at planning.
    let resolver = resolver_with(&[("/repo", Some("repo"), &[("test", "run-z absent")])]);
    let plan = plan_task(&resolver, "/repo", "test").await;
    let absent = plan.call(call_by_name(&plan, "absent"));
    assert!(matches!(absent.task().action(), Action::Unknown));
    assert!(!absent.effective_attrs().contains(IF_PRESENT));
}

#[tokio::test]
async fn attributes_inherit_into_prerequisites() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[("all", "run-z k=v child"), ("child", "echo hi")],
    )]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    let child = plan.call(call_by_name(&plan, "child"));
    assert_eq!(
        child.effective_attrs().get("k"),
        Some(&["v".to_string()][..])
    );
}

#[tokio::test]
async fn reference_cycles_break_at_reencounter() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[("a", "run-z b"), ("b", "run-z a")],
    )]);
    let plan = plan_task(&resolver, "/repo", "a").await;

    assert_eq!(plan.len(), 2);
    let a = plan.call(call_by_name(&plan, "a"));
    let b = plan.call(call_by_name(&plan, "b"));
    assert_eq!(a.prerequisites().len(), 1);
    // The back-edge is dropped, keeping the relation acyclic.
    assert!(b.prerequisites().is_empty());
}

#[tokio::test]
async fn edges_point_at_already_planned_calls() {
    let resolver = resolver_with(&[(
        "/repo",
        Some("repo"),
        &[
            ("all", "run-z a b"),
            ("a", "run-z shared"),
            ("b", "run-z shared"),
            ("shared", "echo s"),
        ],
    )]);
    let plan = plan_task(&resolver, "/repo", "all").await;

    for (id, call) in plan.calls() {
        for &p in call.prerequisites() {
            assert_ne!(p, id, "no self edges");
            assert!(p.0 < plan.len());
        }
    }
}

#[tokio::test]
async fn planning_twice_yields_equal_structure() {
    let packages: &[(&str, Option<&str>, &[(&str, &str)])] = &[(
        "/repo",
        Some("repo"),
        &[
            ("all", "run-z a,b c"),
            ("a", "echo a"),
            ("b", "echo b"),
            ("c", "run-z a"),
        ],
    )];
    let first = resolver_with(packages);
    let second = resolver_with(packages);
    let plan1 = plan_task(&first, "/repo", "all").await;
    let plan2 = plan_task(&second, "/repo", "all").await;
    assert_eq!(shape(&plan1), shape(&plan2));
}
