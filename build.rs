fn main() {
    // The webview shell is optional; the headless controller needs no codegen.
    #[cfg(feature = "desktop")]
    {
        tauri_build::build();
    }
}
