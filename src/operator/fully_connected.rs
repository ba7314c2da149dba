use super::{
    BackwardFn, Forward, InferredShapes, Operator, check_grads, check_known, check_shape,
    check_supplied, input_count_error,
};
use crate::TensorFloat;
use crate::backend::Backend;
use crate::error::{OpError, Result};
use crate::kwargs::Kwargs;
use crate::ops::{cpu, dispatch};
use crate::tensors::{Shape, Tensor};

const NAME: &str = "FullyConnected";
const INPUTS: &[&str] = &["data", "weight", "bias"];
const INPUTS_NO_BIAS: &[&str] = &["data", "weight"];

/// Dense layer, `y = x·Wᵀ + b`.
///
/// With `flatten` the data is viewed as `(batch, everything else)`; without it
/// only the last axis is contracted and the leading axes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullyConnected {
    pub num_hidden: usize,
    pub no_bias: bool,
    pub flatten: bool,
}

impl FullyConnected {
    /// Reads `num_hidden` (required, positive), `no_bias` and `flatten`.
    ///
    /// # Errors
    /// Missing or non-positive `num_hidden`, malformed flags, or any undeclared argument.
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self> {
        kwargs.ensure_known(NAME, &["num_hidden", "no_bias", "flatten"])?;
        let num_hidden: usize = kwargs.require(NAME, "num_hidden")?;
        if num_hidden == 0 {
            return Err(OpError::InvalidArgument {
                op: NAME.to_owned(),
                key: "num_hidden".to_owned(),
                value: "0".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        Ok(Self {
            num_hidden,
            no_bias: kwargs.flag_or(NAME, "no_bias", false)?,
            flatten: kwargs.flag_or(NAME, "flatten", true)?,
        })
    }

    /// `(rows, K)` of the data viewed as a matrix.
    fn data_matrix(&self, data: &Shape) -> Result<(usize, usize)> {
        if data.ndim() == 0 {
            return Err(OpError::InvalidShape {
                shape: data.to_string(),
                reason: format!("{NAME} data needs at least one axis"),
            });
        }
        Ok(if self.flatten {
            data.flat_2d()
        } else {
            data.flat_last()
        })
    }

    fn output_shape(&self, data: &Shape) -> Shape {
        let dims = data.dims();
        let mut out = if self.flatten {
            dims[..1].to_vec()
        } else {
            dims[..dims.len() - 1].to_vec()
        };
        out.push(self.num_hidden);
        out.into()
    }

    fn param_shapes(&self, k: usize) -> (Shape, Shape) {
        (Shape::from([self.num_hidden, k]), Shape::from([self.num_hidden]))
    }
}

impl Operator for FullyConnected {
    fn name(&self) -> &'static str {
        NAME
    }

    fn input_names(&self) -> &'static [&'static str] {
        if self.no_bias { INPUTS_NO_BIAS } else { INPUTS }
    }

    fn backward_name(&self) -> Option<&'static str> {
        Some("_backward_FullyConnected")
    }

    fn infer_shapes(&self, known: &[Shape]) -> Result<InferredShapes> {
        let names = self.input_names();
        check_known(NAME, names, known)?;
        let data = known[0].clone();
        let (_, k) = self.data_matrix(&data)?;
        let (weight, bias) = self.param_shapes(k);

        let mut inputs = vec![data.clone(), weight];
        if !self.no_bias {
            inputs.push(bias);
        }
        check_supplied(NAME, names, &inputs, known)?;
        Ok(InferredShapes {
            inputs,
            outputs: vec![self.output_shape(&data)],
        })
    }

    fn forward(
        &self,
        backend: Backend,
        inputs: &mut [Tensor<TensorFloat>],
        want_backward: bool,
    ) -> Result<Forward> {
        let expected = self.input_names().len();
        let (data, weight, bias) = match (&*inputs, self.no_bias) {
            ([data, weight], true) => (data, weight, None),
            ([data, weight, bias], false) => (data, weight, Some(bias)),
            _ => return Err(input_count_error(NAME, expected, inputs.len())),
        };

        let (m, k) = self.data_matrix(&data.shape)?;
        let n = self.num_hidden;
        let (weight_shape, bias_shape) = self.param_shapes(k);
        check_shape(NAME, "weight", &weight_shape, &weight.shape)?;
        if let Some(bias) = bias {
            check_shape(NAME, "bias", &bias_shape, &bias.shape)?;
        }

        let out = dispatch::fully_connected(
            backend,
            &data.data,
            &weight.data,
            bias.map(|b| &b.data[..]),
            m,
            k,
            n,
        );
        let output = Tensor::new(self.output_shape(&data.shape), out);

        let backward = want_backward.then(|| {
            let data = data.clone();
            let weight = weight.clone();
            let out_shape = output.shape.clone();
            let with_bias = !self.no_bias;
            let back: BackwardFn = Box::new(
                move |grads: &[Tensor<TensorFloat>]| -> Result<Vec<Tensor<TensorFloat>>> {
                    check_grads(NAME, grads, &[&out_shape])?;
                    let dy = &grads[0].data;

                    let dx = cpu::matmul_nn(dy, &weight.data, m, n, k);
                    let dw = cpu::matmul_tn(dy, &data.data, m, n, k);
                    let mut result = vec![
                        Tensor::new(data.shape.clone(), dx),
                        Tensor::new(weight.shape.clone(), dw),
                    ];
                    if with_bias {
                        result.push(Tensor::new([n], cpu::sum_rows(dy, m, n)));
                    }
                    Ok(result)
                },
            );
            back
        });

        Ok(Forward {
            outputs: vec![output],
            backward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::approx_eq;
    use crate::tensor;

    fn op(pairs: &[(&str, &str)]) -> FullyConnected {
        FullyConnected::from_kwargs(&pairs.iter().copied().collect()).unwrap()
    }

    #[test]
    fn parses_arguments() {
        let fc = op(&[("no_bias", "true"), ("num_hidden", "250")]);
        assert_eq!(fc.num_hidden, 250);
        assert!(fc.no_bias);
        assert!(fc.flatten);
        assert_eq!(fc.input_names(), ["data", "weight"]);

        assert!(matches!(
            FullyConnected::from_kwargs(&Kwargs::from([("num_hidden", "0")])),
            Err(OpError::InvalidArgument { .. })
        ));
        assert!(matches!(
            FullyConnected::from_kwargs(&Kwargs::from([("no_bias", "true")])),
            Err(OpError::MissingArgument { .. })
        ));
    }

    #[test]
    fn flattened_shapes() {
        let fc = op(&[("no_bias", "true"), ("num_hidden", "250")]);
        let shapes = fc
            .infer_shapes(&[Shape::from([1, 2, 64, 64]), Shape::from([250, 8192])])
            .unwrap();
        assert_eq!(shapes.inputs[1], Shape::from([250, 8192]));
        assert_eq!(shapes.outputs, vec![Shape::from([1, 250])]);

        let err = fc
            .infer_shapes(&[Shape::from([1, 1, 28, 28]), Shape::from([250, 1728])])
            .unwrap_err();
        assert_eq!(
            err,
            OpError::ShapeMismatch {
                op: NAME.into(),
                input: "weight".into(),
                expected: "(250,784)".into(),
                found: "(250,1728)".into(),
            }
        );
    }

    #[test]
    fn unflattened_shapes_keep_leading_axes() {
        let fc = op(&[("num_hidden", "4"), ("flatten", "false")]);
        let shapes = fc.infer_shapes(&[Shape::from([2, 3, 5])]).unwrap();
        assert_eq!(
            shapes.inputs,
            vec![Shape::from([2, 3, 5]), Shape::from([4, 5]), Shape::from([4])]
        );
        assert_eq!(shapes.outputs, vec![Shape::from([2, 3, 4])]);
        assert!(fc.infer_shapes(&[Shape::default()]).is_err());
    }

    #[test]
    fn forward_and_gradients() {
        let fc = op(&[("num_hidden", "2")]);
        // x: 2x3, W: 2x3, b: 2
        let mut inputs = vec![
            tensor!([[1.0, 2.0, 3.0], [0.0, -1.0, 1.0]]),
            tensor!([[1.0, 0.0, -1.0], [0.5, 0.5, 0.5]]),
            tensor!([0.1, -0.2]),
        ];
        let fwd = fc.forward(Backend::Cpu, &mut inputs, true).unwrap();
        assert_eq!(fwd.outputs[0].shape, Shape::from([2, 2]));
        assert!(approx_eq(&fwd.outputs[0].data[..], &[-1.9, 2.8, -0.9, -0.2][..]));

        let back = fwd.backward.unwrap();
        let grads = back(&[tensor!([[1.0, 0.0], [0.0, 2.0]])]).unwrap();
        assert_eq!(grads.len(), 3);
        // dx = dy·W
        assert!(approx_eq(&grads[0].data[..], &[1.0, 0.0, -1.0, 1.0, 1.0, 1.0][..]));
        // dW = dyᵀ·x
        assert!(approx_eq(&grads[1].data[..], &[1.0, 2.0, 3.0, 0.0, -2.0, 2.0][..]));
        // db = Σ dy
        assert!(approx_eq(&grads[2].data[..], &[1.0, 2.0][..]));
    }

    #[test]
    fn no_bias_gradients_and_input_checks() {
        let fc = op(&[("num_hidden", "1"), ("no_bias", "1")]);
        let mut inputs = vec![tensor!([[[2.0, 3.0]]]), tensor!([[1.0, 1.0]])];
        let fwd = fc.forward(Backend::Cpu, &mut inputs, true).unwrap();
        assert_eq!(fwd.outputs[0].data, vec![5.0]);
        let grads = (fwd.backward.unwrap())(&[tensor!([[1.0]])]).unwrap();
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[0].shape.dims(), &[1, 1, 2]);

        let mut three = vec![tensor!([[1.0]]), tensor!([[1.0]]), tensor!([1.0])];
        assert!(matches!(
            fc.forward(Backend::Cpu, &mut three, false),
            Err(OpError::InputCount { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn unflattened_forward_and_gradients() {
        let fc = op(&[("num_hidden", "2"), ("flatten", "false")]);
        // x: 1x2x3, W: 2x3, b: 2
        let mut inputs = vec![
            tensor!([[[1.0, 2.0, 3.0], [0.0, -1.0, 1.0]]]),
            tensor!([[1.0, 0.0, -1.0], [0.5, 0.5, 0.5]]),
            tensor!([0.1, -0.2]),
        ];
        let fwd = fc.forward(Backend::Cpu, &mut inputs, true).unwrap();
        assert_eq!(fwd.outputs[0].shape, Shape::from([1, 2, 2]));
        assert!(approx_eq(&fwd.outputs[0].data[..], &[-1.9, 2.8, -0.9, -0.2][..]));

        let back = fwd.backward.unwrap();
        let grads = back(&[tensor!([[[1.0, 0.0], [0.0, 2.0]]])]).unwrap();
        assert_eq!(grads[0].shape, Shape::from([1, 2, 3]));
        assert!(approx_eq(&grads[0].data[..], &[1.0, 0.0, -1.0, 1.0, 1.0, 1.0][..]));
        assert_eq!(grads[1].shape, Shape::from([2, 3]));
        assert!(approx_eq(&grads[1].data[..], &[1.0, 2.0, 3.0, 0.0, -2.0, 2.0][..]));
        assert!(approx_eq(&grads[2].data[..], &[1.0, 2.0][..]));
    }
}
