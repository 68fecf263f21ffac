fn main() {
    // Host builds carry no ESP-IDF environment to export.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
