//! CLI argument parsing.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "userfs-setup")]
#[command(about = "Provision the persistent userfs partition")]
#[command(long_about = "Provision the persistent userfs partition.\n\n\
    Run on every boot: extends the partition table with a data partition \
    sized to the rest of the disk if one is missing, formats it with btrfs \
    on first boot, and layers writable overlays for the managed system \
    directories on top.")]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Delete the userfs partition if it exists, then exit
    #[arg(short, long)]
    pub delete: bool,

    /// Force mkfs.btrfs even if the partition already carries a filesystem
    #[arg(short, long)]
    pub force_format: bool,

    /// On first boot, keep a filesystem already present on the new partition
    #[arg(short, long)]
    pub trust_resident: bool,

    /// Skip the writable overlay setup
    #[arg(long)]
    pub skip_overlays: bool,
}
