//! Whole-pipeline job tests over a temporary data directory.

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use remint_jar::{JarReader, JarWriter};
use remint_mappings::{ClassMapping, MappingMetadata, MappingTree};
use remint_pipeline::{
    load_mappings, remap_version, CategoryLimits, DataLayout, JobMappings, MemoryLogSink,
    PipelineEnv, RemapJob, Scheduler, SchedulerConfig,
};
use remint_remap::builder::ClassBuilder;
use remint_remap::{ClassFile, RemapOptions};

fn test_env(root: &Path) -> (PipelineEnv, Arc<MemoryLogSink>) {
    let scheduler = Scheduler::new_with_io_handle(
        SchedulerConfig {
            compute_threads: 2,
            io_threads: 1,
            category_limits: CategoryLimits::default(),
        },
        tokio::runtime::Handle::current(),
    );
    let sink = Arc::new(MemoryLogSink::new());
    let env = PipelineEnv::with_parts(scheduler, DataLayout::new(root), sink.clone());
    (env, sink)
}

fn write_input_jar(path: &Path) {
    let class = ClassBuilder::new("a").field("b", "I", 0x0002).build();
    let mut writer = JarWriter::create(path).unwrap();
    writer.add("a.class", &class.serialize()).unwrap();
    writer
        .add("assets/lang/en_us.json", b"{\"key\":\"value\"}")
        .unwrap();
    writer.finish().unwrap();
}

fn apple_tree() -> MappingTree {
    let mut tree = MappingTree::new(vec!["official".into(), "named".into()]);
    let mut class = ClassMapping::new(vec!["a".into(), "com/example/Apple".into()]);
    class.comment = Some("A tasty fruit.".into());
    tree.insert_class(class);
    tree
}

#[tokio::test]
async fn remap_version_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let (env, sink) = test_env(tmp.path());

    let input_jar = tmp.path().join("jars/mojang/1.20.4/client.jar");
    std::fs::create_dir_all(input_jar.parent().unwrap()).unwrap();
    write_input_jar(&input_jar);

    let output_jar = env
        .layout
        .mapped_jar("mojang", Path::new("1.20.4/client.jar"));

    let job = RemapJob {
        provider: "mojang".into(),
        version: "1.20.4".into(),
        input_jar,
        output_jar: output_jar.clone(),
        namespace: "named".into(),
        options: RemapOptions::default(),
        metadata: Some(MappingMetadata {
            name: "mojmaps".into(),
            version: "1.20.4".into(),
        }),
    };

    let summary = remap_version(&env, job, JobMappings::Single(apple_tree()))
        .await
        .unwrap();
    assert_eq!((summary.classes, summary.resources), (1, 1));

    // Output jar: the class entry moved to its remapped path, resources
    // survive verbatim.
    let mut reader = JarReader::open(&output_jar).unwrap();
    let class_bytes = reader
        .read_entry("com/example/Apple.class")
        .unwrap()
        .expect("remapped class entry present");
    let class = ClassFile::parse(&class_bytes).unwrap();
    assert_eq!(class.this_class_name().unwrap(), "com/example/Apple");
    assert_eq!(
        reader.read_entry("assets/lang/en_us.json").unwrap().unwrap(),
        b"{\"key\":\"value\"}"
    );

    // Side data landed in the per-version mapping cache.
    let comments_path = env.layout.mappings_comments("mojang", "1.20.4");
    let comments: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&comments_path).unwrap()).unwrap();
    assert_eq!(comments["a"]["comment"], "A tasty fruit.");

    let metadata_path = env.layout.mappings_metadata("mojang", "1.20.4");
    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
    assert_eq!(metadata["name"], "mojmaps");
    assert_eq!(metadata["version"], "1.20.4");

    // The job logged under its provider/version key.
    let lines = sink.lines();
    assert!(lines.iter().all(|(key, _)| key.as_str() == "mojang/1.20.4"));
    assert!(lines.len() >= 2);
}

#[tokio::test]
async fn load_mappings_sniffs_tiny_and_proguard() {
    let tmp = tempfile::tempdir().unwrap();
    let (env, _sink) = test_env(tmp.path());

    let tiny = tmp.path().join("mappings-intermediary.tiny");
    std::fs::write(&tiny, "tiny\t2\t0\tofficial\tintermediary\nc\ta\tclass_1\n").unwrap();
    let tree = load_mappings(&env, tiny, ("named".into(), "official".into()))
        .await
        .unwrap();
    assert_eq!(tree.class("a").unwrap().name(1), "class_1");

    let proguard = tmp.path().join("mappings-named.txt");
    std::fs::write(&proguard, "com.example.Apple -> a:\n    int count -> b\n").unwrap();
    let tree = load_mappings(&env, proguard, ("named".into(), "official".into()))
        .await
        .unwrap();
    assert_eq!(tree.namespaces(), ["named", "official"]);
    assert_eq!(tree.class("com/example/Apple").unwrap().name(1), "a");
}

#[tokio::test]
async fn cancelled_environment_aborts_jobs() {
    let tmp = tempfile::tempdir().unwrap();
    let (env, _sink) = test_env(tmp.path());

    let input_jar = tmp.path().join("in.jar");
    write_input_jar(&input_jar);

    env.cancel.cancel();
    let job = RemapJob {
        provider: "mojang".into(),
        version: "1.20.4".into(),
        input_jar,
        output_jar: tmp.path().join("out.jar"),
        namespace: "named".into(),
        options: RemapOptions::default(),
        metadata: None,
    };
    let err = remap_version(&env, job, JobMappings::Single(apple_tree()))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
