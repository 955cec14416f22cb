//! Known target systems
//!
//! System package lists and container base images, keyed by system identifier.

/// Package manager used by a target system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Debian/Ubuntu
    Apt,
    /// CentOS/manylinux
    Yum,
    /// Alpine
    Apk,
}

impl PackageManager {
    /// Refresh command for the package index
    pub fn update_command(&self) -> &'static [&'static str] {
        match self {
            Self::Apt => &["apt-get", "update"],
            Self::Yum => &["yum", "update", "-y"],
            Self::Apk => &["apk", "update"],
        }
    }

    /// Install command prefix; package names are appended
    pub fn install_command(&self) -> &'static [&'static str] {
        match self {
            Self::Apt => &["apt-get", "install", "-y"],
            Self::Yum => &["yum", "install", "-y"],
            Self::Apk => &["apk", "add"],
        }
    }

    /// Cache cleanup run at the end of a generated Dockerfile
    pub fn cleanup_command(&self) -> &'static str {
        match self {
            Self::Apt => "rm -rf /var/lib/apt/lists/*",
            Self::Yum => "yum clean all",
            Self::Apk => "rm -rf /var/cache/apk/*",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Yum => write!(f, "yum"),
            Self::Apk => write!(f, "apk"),
        }
    }
}

/// System packages required before any library can be built
#[derive(Debug, Clone, Copy)]
pub struct SystemPackageSet {
    /// System identifiers this set applies to
    pub systems: &'static [&'static str],
    /// Package manager
    pub manager: PackageManager,
    /// Packages to install
    pub packages: &'static [&'static str],
}

/// System package table
pub const SYSTEM_PACKAGES: &[SystemPackageSet] = &[
    SystemPackageSet {
        systems: &["ubuntu20.04", "ubuntu22.04"],
        manager: PackageManager::Apt,
        packages: &[
            "build-essential",
            "cmake",
            "git",
            "pkg-config",
            "autoconf",
            "automake",
            "libtool",
            "wget",
            "curl",
            "python3",
            "python3-pip",
            "libssl-dev",
            "libcrypto++-dev",
            "zlib1g-dev",
            "ca-certificates",
            "libasio-dev",
            "libprotobuf-dev",
            "protobuf-compiler-grpc",
            "libgrpc++-dev",
            "libgrpc-dev",
            "libunwind-dev",
            "gcc-10",
            "g++-10",
            "libnl-3-dev",
            "libnl-route-3-dev",
        ],
    },
    SystemPackageSet {
        systems: &["manylinux_2014"],
        manager: PackageManager::Yum,
        packages: &[
            "gcc",
            "gcc-c++",
            "make",
            "cmake3",
            "git",
            "pkgconfig",
            "autoconf",
            "automake",
            "libtool",
            "wget",
            "curl",
            "openssl-devel",
            "zlib-devel",
            "which",
            "patch",
            "diffutils",
            "tar",
            "gzip",
            "bzip2",
            "xz",
            "libstdc++-devel",
            "glibc-devel",
            "flex",
            "bison",
            "libnl3",
            "libnl3-devel",
        ],
    },
];

/// Find the package set for a system: exact match first, then substring match either way
pub fn packages_for_system(system_name: &str) -> Option<&'static SystemPackageSet> {
    if let Some(set) = SYSTEM_PACKAGES
        .iter()
        .find(|set| set.systems.contains(&system_name))
    {
        return Some(set);
    }

    SYSTEM_PACKAGES.iter().find(|set| {
        set.systems.iter().any(|system| {
            let matched = system.contains(system_name) || system_name.contains(system);
            if matched {
                tracing::info!("Using partial match: {system} for {system_name}");
            }
            matched
        })
    })
}

/// Container base image for a system
#[derive(Debug, Clone, Copy)]
pub enum SystemImage {
    /// One image for every architecture
    Single(&'static str),
    /// Image per architecture (amd64, arm64, ...)
    PerArch(&'static [(&'static str, &'static str)]),
}

/// System identifier to container image map
pub const SYSTEM_IMAGES: &[(&str, SystemImage)] = &[
    ("ubuntu20.04", SystemImage::Single("ubuntu:20.04")),
    ("ubuntu22.04", SystemImage::Single("ubuntu:22.04")),
    (
        "manylinux_2014",
        SystemImage::PerArch(&[
            ("amd64", "dockcross/manylinux2014-x64"),
            ("arm64", "dockcross/manylinux2014-aarch64"),
        ]),
    ),
];

/// All system identifiers that have a container image
pub fn known_systems() -> Vec<String> {
    SYSTEM_IMAGES
        .iter()
        .map(|(name, _)| (*name).to_string())
        .collect()
}
