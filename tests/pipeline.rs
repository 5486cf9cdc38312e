//! End-to-end pipeline tests against stub external tools.
//!
//! Every external dependency (resize tool, palette tool, extension scripts,
//! daemon handler) is a small shell script written into a temp dir, so the
//! caching and isolation behavior can be observed through the files the
//! stubs leave behind.

use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use wallgrid::colors::ColorCache;
use wallgrid::error::WallgridError;
use wallgrid::repository::{self, Wallpaper};
use wallgrid::theme::ThemeEngine;
use wallgrid::thumbs::ThumbnailCache;
use wallgrid::ui::PageState;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn make_wallpapers(dir: &Path, count: usize) -> Vec<Wallpaper> {
    for i in 0..count {
        File::create(dir.join(format!("wall{i}.png"))).unwrap();
    }
    repository::list(dir).unwrap()
}

fn backdate(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(secs)).unwrap();
}

#[tokio::test]
async fn thumbnail_cache_is_idempotent() {
    let walls = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let wallpapers = make_wallpapers(walls.path(), 3);

    // The stub logs each invocation and creates the destination file, which
    // is the last argument of the resize contract.
    let log = tools.path().join("resize.log");
    let resize = write_script(
        tools.path(),
        "resize.sh",
        &format!("echo run >> {}\ntouch \"$6\"", log.display()),
    );

    let thumbs = ThumbnailCache::new(
        cache.path().to_path_buf(),
        resize.to_string_lossy().to_string(),
        2,
    );
    thumbs.ensure(&wallpapers, walls.path()).await.unwrap();
    assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 3);

    // Second run: the fast existence check must schedule nothing.
    thumbs.ensure(&wallpapers, walls.path()).await.unwrap();
    assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn thumbnail_short_circuit_never_touches_the_tool() {
    let walls = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let wallpapers = make_wallpapers(walls.path(), 2);
    for w in &wallpapers {
        File::create(cache.path().join(&w.unique_id)).unwrap();
    }

    // A tool path that cannot possibly run proves it was never launched.
    let thumbs = ThumbnailCache::new(
        cache.path().to_path_buf(),
        "/nonexistent/resize-tool".to_string(),
        2,
    );
    thumbs.ensure(&wallpapers, walls.path()).await.unwrap();
}

#[tokio::test]
async fn a_failing_resize_tool_is_fatal() {
    let walls = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let wallpapers = make_wallpapers(walls.path(), 1);

    let resize = write_script(tools.path(), "resize.sh", "exit 1");
    let thumbs = ThumbnailCache::new(
        cache.path().to_path_buf(),
        resize.to_string_lossy().to_string(),
        2,
    );
    let err = thumbs.ensure(&wallpapers, walls.path()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WallgridError>(),
        Some(WallgridError::ExternalTool { .. })
    ));
}

#[tokio::test]
async fn color_batch_extracts_misses_once_and_persists_one_document() {
    let walls = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let wallpapers = make_wallpapers(walls.path(), 3);

    let log = tools.path().join("palette.log");
    let palette = write_script(
        tools.path(),
        "palette.sh",
        &format!(
            "echo run >> {}\n\
             echo ' 900: (1,2,3) #010203 srgb(1,2,3)'\n\
             echo ' 300: (9,9,9) #090909 srgb(9,9,9)'",
            log.display()
        ),
    );

    let mut colors = ColorCache::open(cache.path(), palette.to_string_lossy().to_string(), 2);
    colors.ensure(&wallpapers, walls.path()).await.unwrap();
    assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 3);

    for w in &wallpapers {
        assert_eq!(
            colors.get(&w.unique_id).cloned(),
            Some(vec!["#010203".to_string(), "#090909".to_string()])
        );
    }

    let doc: std::collections::HashMap<String, Vec<String>> =
        serde_json::from_str(&fs::read_to_string(cache.path().join("colours.json")).unwrap())
            .unwrap();
    assert_eq!(doc.len(), 3);

    // A fresh cache object reads the persisted document instead of the tool.
    let mut reopened = ColorCache::open(cache.path(), "/nonexistent".to_string(), 2);
    reopened.ensure(&wallpapers, walls.path()).await.unwrap();
    assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn extension_missing_a_capability_fails_the_whole_load() {
    let scripts = tempfile::tempdir().unwrap();
    let themes = tempfile::tempdir().unwrap();

    write_script(scripts.path(), "broken.sh", "echo 'dark-conf set'");
    let err = ThemeEngine::load(scripts.path(), themes.path(), false, 2)
        .await
        .unwrap_err();
    match err.downcast_ref::<WallgridError>() {
        Some(WallgridError::MissingCapability { script, capability }) => {
            assert_eq!(script, "broken.sh");
            assert_eq!(*capability, "light-conf");
        }
        other => panic!("expected MissingCapability, got {other:?}"),
    }
}

#[tokio::test]
async fn a_failing_capability_query_rejects_the_script() {
    let scripts = tempfile::tempdir().unwrap();
    let themes = tempfile::tempdir().unwrap();

    // Advertises everything but exits nonzero; the list must not be trusted.
    write_script(
        scripts.path(),
        "flaky.sh",
        "echo 'dark-conf light-conf set'\nexit 1",
    );
    let err = ThemeEngine::load(scripts.path(), themes.path(), false, 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WallgridError>(),
        Some(WallgridError::ExternalTool { .. })
    ));
}

#[tokio::test]
async fn theme_generation_caches_and_apply_uses_the_cached_file() {
    let walls = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let scripts = tempfile::tempdir().unwrap();
    let themes = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let wallpapers = make_wallpapers(walls.path(), 2);

    let gen_log = tools.path().join("gen.log");
    let set_log = tools.path().join("set.log");
    let script = write_script(
        scripts.path(),
        "term.sh",
        &format!(
            "case \"$1\" in\n\
             capabilities) echo 'dark-conf light-conf set' ;;\n\
             dark-conf|light-conf) echo gen >> {gen}; echo \"mode=$1 colors=$2,$3\" ;;\n\
             set) echo \"$2\" >> {set} ;;\n\
             esac",
            gen = gen_log.display(),
            set = set_log.display()
        ),
    );
    // Make the script comfortably older than the configs it will generate.
    backdate(&script, 120);

    let palette = write_script(
        tools.path(),
        "palette.sh",
        "echo ' 1: (0,0,0) #000000 x'\necho ' 1: (255,255,255) #ffffff x'",
    );
    let mut colors = ColorCache::open(cache.path(), palette.to_string_lossy().to_string(), 2);
    colors.ensure(&wallpapers, walls.path()).await.unwrap();

    let engine = ThemeEngine::load(scripts.path(), themes.path(), false, 2)
        .await
        .unwrap();
    assert_eq!(engine.extension_count(), 1);
    engine.ensure_generated(&wallpapers, &mut colors).await.unwrap();

    for w in &wallpapers {
        let dark = themes.path().join("term.sh").join(format!("{}-dark.conf", w.unique_id));
        let light = themes.path().join("term.sh").join(format!("{}-light.conf", w.unique_id));
        assert!(dark.exists() && light.exists());
        assert!(fs::read_to_string(&dark).unwrap().contains("mode=dark-conf"));
        assert!(fs::read_to_string(&dark).unwrap().contains("#000000,#ffffff"));
    }

    // Second pass regenerates nothing: every config is newer than the script.
    let runs = fs::read_to_string(&gen_log).unwrap().lines().count();
    engine.ensure_generated(&wallpapers, &mut colors).await.unwrap();
    assert_eq!(fs::read_to_string(&gen_log).unwrap().lines().count(), runs);

    // Applying hands the cached dark config path to the script's `set`.
    engine.apply(&wallpapers[0].unique_id).await;
    let applied = fs::read_to_string(&set_log).unwrap();
    assert!(applied.contains(&format!("{}-dark.conf", wallpapers[0].unique_id)));
}

#[test]
fn the_fifth_wallpaper_lives_on_page_two() {
    let walls = tempfile::tempdir().unwrap();
    let wallpapers = make_wallpapers(walls.path(), 5);

    let mut page = PageState::new(wallpapers.len(), Some(4));
    assert!(page.page_forward());
    assert_eq!(page.visible_count(), 1);
    assert_eq!(page.selection, 0);

    let selected = &wallpapers[page.current_index()];
    assert_eq!(selected.name, "wall4.png");
    assert!(!selected.unique_id.is_empty());
}
