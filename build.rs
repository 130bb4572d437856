//! Build script for nftjson
//!
//! Handles compile-time configuration for distro packagers and embeds
//! build-time information (git commit, dirty status, build timestamp).

fn main() {
    // Default nft binary baked in by packagers
    println!("cargo:rerun-if-env-changed=NFTJSON_SYSTEM_NFT_PATH");

    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
