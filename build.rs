fn main() {
    // Embedded sqlx migrations are read at compile time.
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    println!("cargo:rerun-if-changed=migrations");
}
