fn main() {
    println!("cargo:rerun-if-env-changed=LIBTORCH");
    println!("cargo:rerun-if-env-changed=USE_CUDA");

    if std::env::var_os("CARGO_FEATURE_TORCH").is_none() {
        return;
    }

    match std::env::var("LIBTORCH") {
        Ok(libtorch_path) => {
            println!("cargo:rustc-link-search=native={}/lib", libtorch_path);
            if std::env::var_os("USE_CUDA").is_some() {
                println!("cargo:rustc-link-lib=torch_cuda");
            }
        }
        Err(_) => {
            println!("cargo:warning=LIBTORCH is not set, relying on torch-sys to locate libtorch");
        }
    }
}
