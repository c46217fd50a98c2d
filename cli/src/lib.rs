use std::path::PathBuf;

use clap::Args;
use segload::config::{DEFAULT_NAMESPACE, ImageConfig, InputConfig, ProvenanceConfig};
use segload::features::TsvLayout;
use segload::geometry::AreaFilter;
use segload::{Destination, ImageSource, InputFormat, InputSource, LoaderConfig, LoaderError};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("{0}")]
    Usage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DestinationKind {
    File,
    Db,
}

/// Flags of `segload load`.
#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Input type: maskfile, masktile, csv, tsv or aperio
    #[arg(long = "inptype")]
    pub input_type: InputFormat,

    /// A single input file
    #[arg(long = "inpfile", group = "input")]
    pub input_file: Option<PathBuf>,

    /// A file listing one input path per line
    #[arg(long = "inplist", group = "input")]
    pub input_list: Option<PathBuf>,

    /// A directory whose files are all inputs
    #[arg(long = "inpdir", group = "input")]
    pub input_dir: Option<PathBuf>,

    /// Destination: file or db
    #[arg(long = "dest", default_value = "db")]
    pub destination: DestinationKind,

    /// Output folder for the file destination
    #[arg(long = "outfolder")]
    pub out_folder: Option<PathBuf>,

    /// Talk to the database directly (default)
    #[arg(long, conflicts_with = "rest")]
    pub mongo: bool,

    /// Talk to the database through its REST proxy
    #[arg(long)]
    pub rest: bool,

    #[arg(long = "dbhost", default_value = "localhost")]
    pub db_host: String,

    /// Defaults to 27017, or 3000 with --rest
    #[arg(long = "dbport")]
    pub db_port: Option<u16>,

    #[arg(long = "dbname")]
    pub db_name: Option<String>,

    #[arg(long = "dbuser")]
    pub db_user: Option<String>,

    #[arg(long = "dbpasswd")]
    pub db_password: Option<String>,

    /// Case id, for inputs that do not carry one in their name
    #[arg(long = "cid")]
    pub case_id: Option<String>,

    /// Subject id; derived from the case id when omitted
    #[arg(long = "sid")]
    pub subject_id: Option<String>,

    /// Normalize with the image dimensions stored in the database
    #[arg(long = "fromdb", group = "norm_source")]
    pub from_db: bool,

    /// Normalize with explicit image dimensions: width,height
    #[arg(long = "norm", value_delimiter = ',', group = "norm_source")]
    pub norm: Option<Vec<f64>>,

    /// Normalize with the mask raster's own dimensions
    #[arg(long = "self", group = "norm_source")]
    pub self_norm: bool,

    /// Offset added to every coordinate: x,y
    #[arg(long = "shift", value_delimiter = ',')]
    pub shift: Option<Vec<f64>>,

    /// Analysis execution id
    #[arg(long = "eid")]
    pub execution_id: String,

    #[arg(long = "etype", default_value = "computer")]
    pub execution_type: String,

    /// Defaults to "Algorithm: <eid>"
    #[arg(long = "etitle")]
    pub execution_title: Option<String>,

    #[arg(long = "ecolor", default_value = "yellow")]
    pub color: String,

    /// Computation kind; "markup" for aperio input, "segmentation" otherwise
    #[arg(long = "ecomp")]
    pub computation: Option<String>,

    #[arg(long = "studyid")]
    pub study_id: Option<String>,

    #[arg(long = "batchid", default_value = "b0")]
    pub batch_id: String,

    #[arg(long = "tagid", default_value = "t0")]
    pub tag_id: String,

    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Douglas-Peucker tolerance in pixels
    #[arg(long)]
    pub simplify: Option<f64>,

    /// Keep polygons whose pixel area lies in min,max
    #[arg(long = "sizefilter", value_delimiter = ',')]
    pub size_filter: Option<Vec<f64>>,

    /// Files processed concurrently (lists and directories)
    #[arg(long)]
    pub workers: Option<usize>,
}

fn pair(values: &Option<Vec<f64>>, flag: &str) -> Result<Option<[f64; 2]>, CliError> {
    match values.as_deref() {
        None => Ok(None),
        Some(&[a, b]) => Ok(Some([a, b])),
        Some(_) => Err(CliError::Usage(format!("--{flag} takes two comma-separated numbers"))),
    }
}

impl LoadArgs {
    fn source(&self) -> Result<InputSource, CliError> {
        match (&self.input_file, &self.input_list, &self.input_dir) {
            (Some(file), _, _) => Ok(InputSource::File(file.clone())),
            (_, Some(list), _) => Ok(InputSource::List(list.clone())),
            (_, _, Some(dir)) => Ok(InputSource::Directory(dir.clone())),
            _ => Err(CliError::Usage("one of --inpfile, --inplist or --inpdir is required".into())),
        }
    }

    fn destination(&self) -> Result<Destination, CliError> {
        if self.destination == DestinationKind::File {
            let out_folder = self
                .out_folder
                .clone()
                .ok_or_else(|| CliError::Usage("--dest file needs --outfolder".into()))?;
            return Ok(Destination::File { out_folder });
        }

        let database = self
            .db_name
            .clone()
            .ok_or_else(|| CliError::Usage("--dest db needs --dbname".into()))?;
        if self.rest {
            let port = self.db_port.unwrap_or(3000);
            Ok(Destination::Http {
                base_url: format!("http://{}:{port}", self.db_host),
                database,
                username: self.db_user.clone(),
                password: self.db_password.clone(),
            })
        } else {
            let port = self.db_port.unwrap_or(27017);
            let credentials = match (&self.db_user, &self.db_password) {
                (Some(user), Some(password)) => format!("{user}:{password}@"),
                (Some(user), None) => format!("{user}@"),
                _ => String::new(),
            };
            Ok(Destination::Mongo {
                uri: format!("mongodb://{credentials}{}:{port}", self.db_host),
                database,
            })
        }
    }

    fn image(&self) -> Result<ImageConfig, CliError> {
        let source = if let Some([width, height]) = pair(&self.norm, "norm")? {
            ImageSource::Explicit { width, height }
        } else if self.from_db {
            ImageSource::Sink
        } else if self.self_norm {
            ImageSource::Raster
        } else if self.input_type.case_from_path() && self.destination == DestinationKind::Db {
            // tables and tiles are normalized against the stored image
            ImageSource::Sink
        } else {
            ImageSource::None
        };

        Ok(ImageConfig {
            case_id: self.case_id.clone(),
            subject_id: self.subject_id.clone(),
            source,
            normalize: source != ImageSource::None,
            shift: pair(&self.shift, "shift")?,
            ..ImageConfig::default()
        })
    }

    /// Build and validate the run configuration.
    pub fn into_config(self) -> Result<LoaderConfig, CliError> {
        let input = InputConfig {
            source: self.source()?,
            format: self.input_type,
            workers: self.workers,
            tsv_layout: TsvLayout::default(),
        };
        let mut config = LoaderConfig::new(input, self.destination()?, self.execution_id.clone());
        config.image = self.image()?;
        config.provenance = ProvenanceConfig {
            execution_id: self.execution_id,
            analysis_type: self.execution_type,
            title: self.execution_title,
            color: self.color,
            computation: self.computation,
            study_id: self.study_id,
            batch_id: self.batch_id,
            tag_id: self.tag_id,
            namespace: self.namespace,
        };
        config.filter.simplify = self.simplify;
        if let Some([min, max]) = pair(&self.size_filter, "sizefilter")? {
            config.filter.area = AreaFilter { min, max };
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: LoadArgs,
    }

    fn parse(args: &[&str]) -> Result<LoaderConfig, CliError> {
        let mut argv = vec!["segload"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).expect("flags should parse").args.into_config()
    }

    #[test]
    fn test_tsv_list_into_database_defaults_to_lookup_normalization() {
        let config = parse(&[
            "--inptype", "tsv", "--inplist", "files.txt", "--dbname", "quip", "--eid", "seg-1",
        ])
        .unwrap();

        assert_eq!(config.input.format, InputFormat::Tsv);
        assert_eq!(config.input.source, InputSource::List("files.txt".into()));
        assert_eq!(config.image.source, ImageSource::Sink);
        assert!(config.image.normalize);
        assert_eq!(config.worker_count(), 6);
        assert_eq!(
            config.destination,
            Destination::Mongo { uri: "mongodb://localhost:27017".into(), database: "quip".into() }
        );
        assert_eq!(config.execution().title, "Algorithm: seg-1");
    }

    #[test]
    fn test_aperio_to_file_with_explicit_dimensions() {
        let config = parse(&[
            "--inptype", "aperio", "--inpfile", "a.xml", "--dest", "file", "--outfolder", "out",
            "--cid", "TCGA-1-2-3", "--norm", "4000,3000", "--shift", "10,20", "--eid", "m1",
            "--sizefilter", "5,500", "--simplify", "0.5",
        ])
        .unwrap();

        assert_eq!(config.image.source, ImageSource::Explicit { width: 4000.0, height: 3000.0 });
        assert_eq!(config.image.shift, Some([10.0, 20.0]));
        assert_eq!(config.filter.area, AreaFilter { min: 5.0, max: 500.0 });
        assert_eq!(config.filter.simplify, Some(0.5));
        assert_eq!(config.worker_count(), 1);
        assert_eq!(config.execution().computation, "markup");
    }

    #[test]
    fn test_pair_flags_take_comma_separated_values() {
        let config = parse(&[
            "--inptype", "maskfile", "--inpfile", "m.png", "--dest", "file", "--outfolder", "o",
            "--shift", "4096,8192", "--sizefilter", "10,2000", "--eid", "e",
        ])
        .unwrap();
        assert_eq!(config.image.shift, Some([4096.0, 8192.0]));
        assert_eq!(config.image.source, ImageSource::None);
        assert!(!config.image.normalize);
        assert_eq!(config.filter.area, AreaFilter { min: 10.0, max: 2000.0 });

        let err = parse(&[
            "--inptype", "maskfile", "--inpfile", "m.png", "--dest", "file", "--outfolder", "o",
            "--norm", "100,200,300", "--eid", "e",
        ])
        .unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[test]
    fn test_rest_destination_uses_proxy_port() {
        let config = parse(&[
            "--inptype", "csv", "--inpdir", "in", "--rest", "--dbhost", "quip", "--dbname", "u24",
            "--dbuser", "loader", "--dbpasswd", "secret", "--eid", "e",
        ])
        .unwrap();

        match config.destination {
            Destination::Http { base_url, username, .. } => {
                assert_eq!(base_url, "http://quip:3000");
                assert_eq!(username.as_deref(), Some("loader"));
            }
            other => panic!("unexpected destination {other:?}"),
        }
    }

    #[test]
    fn test_missing_pieces_are_usage_errors() {
        let err = parse(&["--inptype", "tsv", "--inpfile", "x.tsv", "--eid", "e"]).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));

        let err = parse(&["--inptype", "tsv", "--dest", "file", "--eid", "e", "--outfolder", "o"]).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));

        // a lookup needs a database destination
        let err = parse(&[
            "--inptype", "maskfile", "--inpfile", "m.png", "--dest", "file", "--outfolder", "o",
            "--fromdb", "--eid", "e",
        ])
        .unwrap_err();
        assert!(matches!(err, CliError::Loader(LoaderError::Configuration(_))));
    }
}
