use std::fs;
use std::path::{Path, PathBuf};

/// Write a tab-delimited source and return its path.
pub fn write_source(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write source");
    path
}

/// Gene expression source over samples S1..S4.
pub fn expression(dir: &Path) -> PathBuf {
    write_source(
        dir,
        "mrna.tsv",
        "gene\tS1\tS2\tS3\tS4\n\
         BRCA1\t1.0\t2.0\t3.0\t4.0\n\
         EGFR\t2.5\t1.5\t0.5\t3.5\n\
         TP53\t0.1\t0.2\tNA\t0.4\n",
    )
}

/// miRNA source sharing S2..S4 with [`expression`], in another order.
pub fn mirna(dir: &Path) -> PathBuf {
    write_source(
        dir,
        "mirna.tsv",
        "mirna\tS4\tS3\tS2\tS9\n\
         hsa-mir-21\t8.0\t6.0\t4.0\t1.0\n\
         hsa-mir-155\t1.0\t3.0\t2.0\t0.0\n",
    )
}

/// miRNA source that shares no sample with [`expression`].
pub fn disjoint(dir: &Path) -> PathBuf {
    write_source(
        dir,
        "other.tsv",
        "mirna\tX1\tX2\nhsa-mir-21\t1.0\t2.0\n",
    )
}
