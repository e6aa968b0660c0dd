//! 加载器图集成测试
//!
//! 验证类加载查找链的端到端行为：Fragment 内容优先级、
//! 动态导入收敛、引导委派和并发加载下的类身份唯一。

use std::sync::Arc;
use std::thread;

use oxgi_core::loader::{BootLoader, LoaderGraph, MemoryContent};
use oxgi_core::module::descriptor::{
    Capability, DynamicPattern, Module, ModuleDescriptor, Requirement,
};
use oxgi_core::module::{Resolver, ResolverState};
use oxgi_core::CoreError;

struct Harness {
    state: Arc<ResolverState>,
    resolver: Arc<Resolver>,
    graph: Arc<LoaderGraph>,
}

fn harness(boot_delegation: &[&str], boot_content: MemoryContent) -> Harness {
    let state = Arc::new(ResolverState::new());
    let resolver = Arc::new(Resolver::new(Arc::clone(&state), vec![]));
    let patterns: Vec<String> = boot_delegation.iter().map(|s| s.to_string()).collect();
    let graph = Arc::new(LoaderGraph::new(
        Arc::clone(&state),
        Arc::clone(&resolver),
        Arc::new(BootLoader::new(Arc::new(boot_content))),
        &patterns,
    ));
    Harness {
        state,
        resolver,
        graph,
    }
}

impl Harness {
    fn install(&self, desc: ModuleDescriptor, content: MemoryContent) -> Arc<Module> {
        let module = self.state.add_module(Arc::new(desc)).unwrap();
        self.graph.register_content(module.id(), Arc::new(content));
        module
    }
}

#[test]
fn test_fragment_precedence_host_wins() {
    let h = harness(&[], MemoryContent::new());
    let host = h.install(
        ModuleDescriptor::bundle("host", "1.0").unwrap(),
        MemoryContent::new()
            .with_class("com.acme.X", vec![b'h'])
            .with_entry("shared.txt", b"host".to_vec()),
    );
    h.install(
        ModuleDescriptor::fragment(
            "host.fragment",
            "1.0",
            Requirement::fragment_host("host", "").unwrap(),
        )
        .unwrap(),
        MemoryContent::new()
            .with_class("com.acme.X", vec![b'f'])
            .with_entry("shared.txt", b"fragment".to_vec())
            .with_entry("only-in-fragment.txt", b"unique".to_vec()),
    );
    h.resolver.resolve(host.id()).unwrap();

    // 同名类/资源宿主获胜
    let class = h.graph.load_class(host.id(), "com.acme.X").unwrap();
    assert_eq!(class.bytes, vec![b'h']);
    assert_eq!(
        h.graph.get_resource(host.id(), "shared.txt").unwrap(),
        b"host".to_vec()
    );
    // Fragment 独有的资源经宿主节点可达
    assert_eq!(
        h.graph
            .get_resource(host.id(), "only-in-fragment.txt")
            .unwrap(),
        b"unique".to_vec()
    );
}

#[test]
fn test_dynamic_import_convergence() {
    let h = harness(&[], MemoryContent::new());
    let provider = h.install(
        ModuleDescriptor::bundle("provider", "1.0")
            .unwrap()
            .with_capability(Capability::package("com.acme", "1.0").unwrap()),
        MemoryContent::new().with_class("com.acme.Widget", vec![42]),
    );
    let consumer = h.install(
        ModuleDescriptor::bundle("consumer", "1.0")
            .unwrap()
            .with_dynamic(DynamicPattern::parse("com.acme.*")),
        MemoryContent::new(),
    );
    h.resolver.resolve(consumer.id()).unwrap();
    assert!(!provider.is_resolved());

    // 动态导入：pattern 是 com.acme.* 但类在 com.acme 包——不匹配
    assert!(h.graph.load_class(consumer.id(), "com.acme.Widget").is_err());

    // 精确模式命中：提供方被按需解析，二次加载返回同一类对象
    let consumer2 = h.install(
        ModuleDescriptor::bundle("consumer2", "1.0")
            .unwrap()
            .with_dynamic(DynamicPattern::parse("com.acme")),
        MemoryContent::new(),
    );
    h.resolver.resolve(consumer2.id()).unwrap();

    let first = h.graph.load_class(consumer2.id(), "com.acme.Widget").unwrap();
    assert!(provider.is_resolved());
    let second = h.graph.load_class(consumer2.id(), "com.acme.Widget").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.defined_by, provider.id());
}

#[test]
fn test_dynamic_wildcard_any() {
    let h = harness(&[], MemoryContent::new());
    let provider = h.install(
        ModuleDescriptor::bundle("provider", "1.0")
            .unwrap()
            .with_capability(Capability::package("anything.at.all", "1.0").unwrap()),
        MemoryContent::new().with_class("anything.at.all.T", vec![1]),
    );
    let consumer = h.install(
        ModuleDescriptor::bundle("consumer", "1.0")
            .unwrap()
            .with_dynamic(DynamicPattern::parse("*")),
        MemoryContent::new(),
    );
    h.resolver.resolve(consumer.id()).unwrap();

    let class = h.graph.load_class(consumer.id(), "anything.at.all.T").unwrap();
    assert_eq!(class.defined_by, provider.id());
}

#[test]
fn test_boot_delegation_bypasses_module_graph() {
    let h = harness(
        &["java.*", "sun.misc"],
        MemoryContent::new().with_class("java.util.List", vec![0]),
    );
    let m = h.install(
        ModuleDescriptor::bundle("a", "1.0")
            .unwrap()
            .with_capability(Capability::package("java.util", "1.0").unwrap()),
        MemoryContent::new().with_class("java.util.List", vec![9]),
    );
    h.resolver.resolve(m.id()).unwrap();

    // 引导委派命中时本地导出被绕过
    let class = h.graph.load_class(m.id(), "java.util.List").unwrap();
    assert_eq!(class.bytes, vec![0]);
}

#[test]
fn test_import_routing_and_fall_through() {
    let h = harness(&[], MemoryContent::new());
    let exporter = h.install(
        ModuleDescriptor::bundle("exporter", "1.0")
            .unwrap()
            .with_capability(Capability::package("com.shared", "1.0").unwrap()),
        MemoryContent::new().with_class("com.shared.Api", vec![1]),
    );
    let importer = h.install(
        ModuleDescriptor::bundle("importer", "1.0")
            .unwrap()
            .with_requirement(Requirement::import_package("com.shared", "").unwrap()),
        MemoryContent::new().with_class("com.shared.LocalOnly", vec![2]),
    );
    h.resolver.resolve(importer.id()).unwrap();

    // 导入包的类路由到导出方
    let api = h.graph.load_class(importer.id(), "com.shared.Api").unwrap();
    assert_eq!(api.defined_by, exporter.id());
    // 导出方没有的类降级回本地内容
    let local = h
        .graph
        .load_class(importer.id(), "com.shared.LocalOnly")
        .unwrap();
    assert_eq!(local.defined_by, importer.id());
}

#[test]
fn test_concurrent_loads_converge_to_one_class() {
    let h = harness(&[], MemoryContent::new());
    let m = h.install(
        ModuleDescriptor::bundle("a", "1.0").unwrap(),
        MemoryContent::new().with_class("com.acme.Hot", vec![7]),
    );
    h.resolver.resolve(m.id()).unwrap();

    let graph = Arc::clone(&h.graph);
    let id = m.id();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let graph = Arc::clone(&graph);
            thread::spawn(move || graph.load_class(id, "com.acme.Hot").unwrap())
        })
        .collect();

    let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // 并发首次定义收敛到同一个赢家
    for class in &classes[1..] {
        assert!(Arc::ptr_eq(&classes[0], class));
    }
}

#[test]
fn test_recursion_guard_under_mutual_dynamic_imports() {
    let h = harness(&[], MemoryContent::new());
    let a = h.install(
        ModuleDescriptor::bundle("a", "1.0")
            .unwrap()
            .with_capability(Capability::package("p", "1.0").unwrap())
            .with_dynamic(DynamicPattern::parse("*")),
        MemoryContent::new(),
    );
    h.install(
        ModuleDescriptor::bundle("b", "1.0")
            .unwrap()
            .with_capability(Capability::package("p", "2.0").unwrap())
            .with_dynamic(DynamicPattern::parse("*")),
        MemoryContent::new(),
    );
    h.resolver.resolve(a.id()).unwrap();

    // 互相动态导入且谁都没有类字节：必须有限步终止于未找到
    let err = h.graph.load_class(a.id(), "p.Ghost").unwrap_err();
    assert!(matches!(err, CoreError::ClassNotFound { .. }));

    // 递归保护不跨调用留下否定缓存：补上内容后再次加载成功
    let c = h.install(
        ModuleDescriptor::bundle("c", "1.0")
            .unwrap()
            .with_capability(Capability::package("p", "3.0").unwrap()),
        MemoryContent::new().with_class("p.Ghost", vec![3]),
    );
    let class = h.graph.load_class(a.id(), "p.Ghost").unwrap();
    assert_eq!(class.defined_by, c.id());
}

#[test]
fn test_load_through_fragment_id_uses_host_node() {
    let h = harness(&[], MemoryContent::new());
    let host = h.install(
        ModuleDescriptor::bundle("host", "1.0").unwrap(),
        MemoryContent::new().with_class("com.h.A", vec![1]),
    );
    let fragment = h.install(
        ModuleDescriptor::fragment(
            "host.fragment",
            "1.0",
            Requirement::fragment_host("host", "").unwrap(),
        )
        .unwrap(),
        MemoryContent::new(),
    );
    h.resolver.resolve(host.id()).unwrap();

    let via_fragment = h.graph.load_class(fragment.id(), "com.h.A").unwrap();
    let via_host = h.graph.load_class(host.id(), "com.h.A").unwrap();
    assert!(Arc::ptr_eq(&via_fragment, &via_host));
}
