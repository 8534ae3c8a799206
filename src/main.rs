fn main() {
    clipboard_archive_lib::run()
}
