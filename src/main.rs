use avl_engine::avl_tree::*;
use avl_engine::config::ConfigT;
use avl_engine::sample::*;
use itertools::Itertools;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::fmt::Display;

fn initialize_logging() {
    let level = std::env::var("AVL_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = TermLogger::init(
        level,
        ConfigBuilder::new().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("logger already set: {}", e);
    }
}

fn print_edges<C: ConfigT>(tree: &AvlTree<i64, C>) {
    for edge in tree.edges() {
        let show = |k: Option<&i64>| k.map_or("-".to_string(), |k| k.to_string());
        println!("  {} -> ({}, {})", edge.key, show(edge.left), show(edge.right));
    }
}

fn show_keys<T: Display>(keys: &[T]) -> String {
    format!("[{}]", keys.iter().join(", "))
}

fn baseline_fixed() {
    println!("=== BST with fixed keys ===");
    let mut tree = match Baseline::from_keys([55, 30, 80, 20, 45, 70, 90]) {
        Ok(tree) => tree,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    print_edges(&tree);
    println!("search 45: {}", tree.search(&45));
    tree.delete(&30);
    if let Err(e) = tree.insert(60) {
        error!("{}", e);
    }
    println!("height: {}", tree.height());
    println!("depth of 45: {:?}", tree.depth_of(&45));
    print_edges(&tree);
}

fn avl_activity() {
    println!("\n=== AVL insert/delete/range/depth ===");
    let mut tree: Default<i64> = Default::new();
    for key in [9, 5, 10, 0, 6, 11, -1, 1, 2] {
        if let Err(e) = tree.insert(key) {
            error!("{}", e);
        }
    }
    println!("in-order: {}", show_keys(&tree.in_order()));
    for key in [10, 11] {
        tree.delete(&key);
    }
    println!("in-order after delete: {}", show_keys(&tree.in_order()));
    println!("keys in [1, 9]: {}", show_keys(&tree.range_query(&1, &9)));
    match tree.depth_of(&6) {
        Some(depth) => println!("node 6 is at depth {}", depth),
        None => println!("node 6 not found"),
    }
}

fn forced_rotation(title: &str, keys: &[i64]) {
    println!("\n=== {} ===", title);
    let mut tree: Default<i64> = Default::new();
    for &key in keys {
        if let Err(e) = tree.insert(key) {
            error!("{}", e);
        }
        println!("after {}:", key);
        print_edges(&tree);
    }
}

fn baseline_random() {
    println!("\n=== BST with random keys ===");
    let mut rng = seeded_rng(7);
    let keys = sample_distinct(&mut rng, 1..=200, 15);
    println!("keys: {}", show_keys(&keys));
    match Baseline::from_keys(keys) {
        Ok(tree) => {
            print_edges(&tree);
            println!("height: {}", tree.height());
        }
        Err(e) => error!("{}", e),
    }
}

fn random_avl() {
    println!("\n=== AVL with random keys ===");
    let mut rng = seeded_rng(5);
    let keys = sample_distinct(&mut rng, 1..=200, 20);
    println!("keys: {}", show_keys(&keys));
    match Default::from_keys(keys) {
        Ok(tree) => {
            info!("built tree of {} keys, height {}", tree.len(), tree.height());
            print_edges(&tree);
        }
        Err(e) => error!("{}", e),
    }
}

pub fn main() {
    initialize_logging();
    baseline_fixed();
    baseline_random();
    avl_activity();
    forced_rotation("single rotation (RR)", &[10, 20, 30]);
    forced_rotation("double rotation (RL)", &[10, 30, 20]);
    random_avl();
}
